use bitflags::bitflags;
use std::fmt;

/// Security actions as defined in ECMA-335 and .NET Framework
///
/// The action of a `DeclSecurity` row controls how the runtime applies the attached permission
/// set to the annotated type, method or assembly.
///
/// # Reference
/// * ECMA-335 II.22.11
/// * <https://learn.microsoft.com/en-us/dotnet/api/system.security.permissions.securityaction>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityAction {
    /// Without further checks, refuse Demand for the specified permission.
    Deny,
    /// Check that all callers in the call chain have been granted the permission.
    Demand,
    /// Without further checks, satisfy Demand for the specified permission.
    Assert,
    /// Check that the current assembly has been granted the specified permission.
    NonCasDemand,
    /// Check that the immediate caller has been granted the specified permission.
    LinkDemand,
    /// The permission must be granted to inherit from a class or override a virtual method.
    InheritanceDemand,
    /// Minimum permissions required to run.
    RequestMinimum,
    /// Optional permissions to grant.
    RequestOptional,
    /// Permissions that must not be granted.
    RequestRefuse,
    /// Reserved for implementation-specific use.
    PrejitGrant,
    /// Reserved for implementation-specific use.
    PrejitDeny,
    /// Non-CAS version of `LinkDemand`.
    NonCasLinkDemand,
    /// Non-CAS version of `InheritanceDemand`.
    NonCasInheritance,
    /// Link demand for any one of the given permissions.
    LinkDemandChoice,
    /// Inheritance demand for any one of the given permissions.
    InheritanceDemandChoice,
    /// Demand for any one of the given permissions.
    DemandChoice,
    /// Refuse Demand for all permissions other than those specified.
    PermitOnly,
    /// A value outside the documented range, preserved as read.
    Unknown(u16),
}

impl SecurityAction {
    /// The raw `Action` column value.
    #[must_use]
    pub fn value(self) -> u16 {
        match self {
            SecurityAction::Deny => 0x0001,
            SecurityAction::Demand => 0x0002,
            SecurityAction::Assert => 0x0003,
            SecurityAction::NonCasDemand => 0x0004,
            SecurityAction::LinkDemand => 0x0005,
            SecurityAction::InheritanceDemand => 0x0006,
            SecurityAction::RequestMinimum => 0x0007,
            SecurityAction::RequestOptional => 0x0008,
            SecurityAction::RequestRefuse => 0x0009,
            SecurityAction::PrejitGrant => 0x000A,
            SecurityAction::PrejitDeny => 0x000B,
            SecurityAction::NonCasLinkDemand => 0x000C,
            SecurityAction::NonCasInheritance => 0x000D,
            SecurityAction::LinkDemandChoice => 0x000E,
            SecurityAction::InheritanceDemandChoice => 0x000F,
            SecurityAction::DemandChoice => 0x0010,
            SecurityAction::PermitOnly => 0x0011,
            SecurityAction::Unknown(value) => value,
        }
    }
}

impl From<u16> for SecurityAction {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => SecurityAction::Deny,
            0x0002 => SecurityAction::Demand,
            0x0003 => SecurityAction::Assert,
            0x0004 => SecurityAction::NonCasDemand,
            0x0005 => SecurityAction::LinkDemand,
            0x0006 => SecurityAction::InheritanceDemand,
            0x0007 => SecurityAction::RequestMinimum,
            0x0008 => SecurityAction::RequestOptional,
            0x0009 => SecurityAction::RequestRefuse,
            0x000A => SecurityAction::PrejitGrant,
            0x000B => SecurityAction::PrejitDeny,
            0x000C => SecurityAction::NonCasLinkDemand,
            0x000D => SecurityAction::NonCasInheritance,
            0x000E => SecurityAction::LinkDemandChoice,
            0x000F => SecurityAction::InheritanceDemandChoice,
            0x0010 => SecurityAction::DemandChoice,
            0x0011 => SecurityAction::PermitOnly,
            _ => SecurityAction::Unknown(value),
        }
    }
}

impl fmt::Display for SecurityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityAction::Unknown(value) => write!(f, "Unknown(0x{:04X})", value),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Well-known permission attribute classes
///
/// Binary permission sets name the attribute class (`...Attribute`), XML permission sets name
/// the permission class itself.
pub mod security_classes {
    /// The attribute wrapping a whole XML permission set
    pub const PERMISSION_SET_ATTRIBUTE: &str =
        "System.Security.Permissions.PermissionSetAttribute";

    /// Security Permission - Controls access to security-sensitive operations
    pub const SECURITY_PERMISSION_ATTRIBUTE: &str =
        "System.Security.Permissions.SecurityPermissionAttribute";

    /// File IO Permission - Controls access to files and directories
    pub const FILE_IO_PERMISSION_ATTRIBUTE: &str =
        "System.Security.Permissions.FileIOPermissionAttribute";

    /// Registry Permission - Controls access to registry keys
    pub const REGISTRY_PERMISSION_ATTRIBUTE: &str =
        "System.Security.Permissions.RegistryPermissionAttribute";

    /// Reflection Permission - Controls use of reflection
    pub const REFLECTION_PERMISSION_ATTRIBUTE: &str =
        "System.Security.Permissions.ReflectionPermissionAttribute";

    /// Environment Permission - Controls access to environment variables
    pub const ENVIRONMENT_PERMISSION_ATTRIBUTE: &str =
        "System.Security.Permissions.EnvironmentPermissionAttribute";

    /// UI Permission - Controls UI operations
    pub const UI_PERMISSION_ATTRIBUTE: &str = "System.Security.Permissions.UIPermissionAttribute";

    /// Class of the `PermissionSet` XML root
    pub const PERMISSION_SET: &str = "System.Security.PermissionSet";

    /// Security Permission, as named in XML permission sets
    pub const SECURITY_PERMISSION: &str = "System.Security.Permissions.SecurityPermission";

    /// File IO Permission, as named in XML permission sets
    pub const FILE_IO_PERMISSION: &str = "System.Security.Permissions.FileIOPermission";
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// SecurityPermissionFlags - Controls access to security-sensitive operations.
    ///
    /// These flags correspond to the SecurityPermissionFlag enumeration in .NET and are the
    /// value of the `Flags` argument of a `SecurityPermissionAttribute`.
    pub struct SecurityPermissionFlags: i32 {
        /// Enables the code to assert that it is authorized to access resources.
        const SECURITY_FLAG_ASSERTION = 0x0000_0001;
        /// Enables calls into unmanaged code.
        const SECURITY_FLAG_UNMANAGED_CODE = 0x0000_0002;
        /// Enables bypassing of code verification by the runtime.
        const SECURITY_FLAG_SKIP_VERIFICATION = 0x0000_0004;
        /// Enables code execution.
        const SECURITY_FLAG_EXECUTION = 0x0000_0008;
        /// Enables control over threads.
        const SECURITY_FLAG_CONTROL_THREAD = 0x0000_0010;
        /// Enables providing and modifying evidence.
        const SECURITY_FLAG_CONTROL_EVIDENCE = 0x0000_0020;
        /// Enables viewing and modifying security policy.
        const SECURITY_FLAG_CONTROL_POLICY = 0x0000_0040;
        /// Enables serialization services.
        const SECURITY_FLAG_SERIALIZATION = 0x0000_0080;
        /// Enables control over the application domain.
        const SECURITY_FLAG_CONTROL_DOMAIN_POLICY = 0x0000_0100;
        /// Enables manipulation of the principal object.
        const SECURITY_FLAG_CONTROL_PRINCIPAL = 0x0000_0200;
        /// Enables creation and manipulation of application domains.
        const SECURITY_FLAG_CONTROL_APPDOMAIN = 0x0000_0400;
        /// Enables configuration of remoting types and channels.
        const SECURITY_FLAG_REMOTING_CONFIGURATION = 0x0000_0800;
        /// Enables plugging code into the common language runtime infrastructure.
        const SECURITY_FLAG_INFRASTRUCTURE = 0x0000_1000;
        /// Enables explicit binding redirection in the configuration file.
        const SECURITY_FLAG_BINDING_REDIRECTS = 0x0000_2000;
    }
}

impl SecurityPermissionFlags {
    /// Parses the comma-separated flag names used by `SecurityPermissionFlag` strings.
    ///
    /// Unknown names are ignored. `AllFlags` selects every flag.
    #[must_use]
    pub fn from_names(names: &str) -> Self {
        let mut flags = SecurityPermissionFlags::empty();

        for name in names.split(',').map(str::trim) {
            flags |= match name {
                "AllFlags" => SecurityPermissionFlags::all(),
                "Assertion" => SecurityPermissionFlags::SECURITY_FLAG_ASSERTION,
                "UnmanagedCode" => SecurityPermissionFlags::SECURITY_FLAG_UNMANAGED_CODE,
                "SkipVerification" => SecurityPermissionFlags::SECURITY_FLAG_SKIP_VERIFICATION,
                "Execution" => SecurityPermissionFlags::SECURITY_FLAG_EXECUTION,
                "ControlThread" => SecurityPermissionFlags::SECURITY_FLAG_CONTROL_THREAD,
                "ControlEvidence" => SecurityPermissionFlags::SECURITY_FLAG_CONTROL_EVIDENCE,
                "ControlPolicy" => SecurityPermissionFlags::SECURITY_FLAG_CONTROL_POLICY,
                "SerializationFormatter" => SecurityPermissionFlags::SECURITY_FLAG_SERIALIZATION,
                "ControlDomainPolicy" => {
                    SecurityPermissionFlags::SECURITY_FLAG_CONTROL_DOMAIN_POLICY
                }
                "ControlPrincipal" => SecurityPermissionFlags::SECURITY_FLAG_CONTROL_PRINCIPAL,
                "ControlAppDomain" => SecurityPermissionFlags::SECURITY_FLAG_CONTROL_APPDOMAIN,
                "RemotingConfiguration" => {
                    SecurityPermissionFlags::SECURITY_FLAG_REMOTING_CONFIGURATION
                }
                "Infrastructure" => SecurityPermissionFlags::SECURITY_FLAG_INFRASTRUCTURE,
                "BindingRedirects" => SecurityPermissionFlags::SECURITY_FLAG_BINDING_REDIRECTS,
                _ => SecurityPermissionFlags::empty(),
            };
        }

        flags
    }
}

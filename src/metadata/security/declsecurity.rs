//! Rows of the `DeclSecurity` metadata table (ECMA-335 II.22.11).
//!
//! Each row binds a [`SecurityAction`] and a permission set blob to a type, a method or the
//! assembly:
//!
//! | Column          | Size                     |
//! |-----------------|--------------------------|
//! | `Action`        | 2 bytes                  |
//! | `Parent`        | `HasDeclSecurity` index  |
//! | `PermissionSet` | `#Blob` heap index       |
//!
//! [`DeclSecurityRaw`] is the row as stored, [`DeclSecurity`] the decoded form with the parent
//! coded index expanded into a [`Token`].

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        module::ModuleDef,
        security::{DeclSecurityReader, SecurityAction, SecurityAttributeList},
        token::Token,
    },
    Result,
};

/// Tables a `HasDeclSecurity` coded index can point into, in tag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum HasDeclSecurity {
    /// `TypeDef` table
    TypeDef,
    /// `MethodDef` table
    MethodDef,
    /// `Assembly` table
    Assembly,
}

impl HasDeclSecurity {
    /// Number of low bits holding the tag.
    pub const TAG_BITS: u32 = usize::BITS - (HasDeclSecurity::COUNT - 1).leading_zeros();

    /// The metadata table id of this target.
    #[must_use]
    pub fn table(self) -> u8 {
        match self {
            HasDeclSecurity::TypeDef => Token::TYPE_DEF,
            HasDeclSecurity::MethodDef => Token::METHOD_DEF,
            HasDeclSecurity::Assembly => Token::ASSEMBLY,
        }
    }

    /// Splits a coded index into its target and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a tag outside the three valid targets.
    pub fn decode(value: u32) -> Result<(HasDeclSecurity, u32)> {
        let tag = value & ((1 << Self::TAG_BITS) - 1);
        let target = HasDeclSecurity::iter()
            .nth(tag as usize)
            .ok_or_else(|| malformed_error!("Invalid HasDeclSecurity tag {}", tag))?;

        Ok((target, value >> Self::TAG_BITS))
    }

    /// Encodes `token` as a coded index.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the token is not a `TypeDef`, `MethodDef` or
    /// `Assembly` token.
    pub fn encode(token: Token) -> Result<u32> {
        let tag = HasDeclSecurity::iter()
            .position(|target| token.is_table(target.table()))
            .ok_or_else(|| malformed_error!("Token {} cannot own declarative security", token))?;

        Ok((token.row() << Self::TAG_BITS) | tag as u32)
    }
}

/// A `DeclSecurity` row as stored in the table stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclSecurityRaw {
    /// Row id, starting at 1
    pub rid: u32,
    /// Metadata token of this row
    pub token: Token,
    /// Byte offset of the row in the table data
    pub offset: usize,
    /// Raw `Action` column
    pub action: u16,
    /// Raw `HasDeclSecurity` coded index
    pub parent: u32,
    /// `#Blob` heap index of the permission set
    pub permission_set: u32,
}

impl DeclSecurityRaw {
    /// Size of one row, given whether the coded index and blob index are 4 bytes wide.
    #[must_use]
    #[rustfmt::skip]
    pub fn row_size(large_parent: bool, large_blob: bool) -> u32 {
        let width = |large: bool| if large { 4 } else { 2 };
        /* action */            2 +
        /* parent */            width(large_parent) +
        /* permission_set */    width(large_blob)
    }

    /// Reads row `rid` at `offset`, advancing it past the row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row extends past `data`.
    pub fn read_row(
        data: &[u8],
        offset: &mut usize,
        rid: u32,
        large_parent: bool,
        large_blob: bool,
    ) -> Result<Self> {
        let offset_org = *offset;

        Ok(DeclSecurityRaw {
            rid,
            token: Token::from_parts(Token::DECL_SECURITY, rid),
            offset: offset_org,
            action: read_le_at::<u16>(data, offset)?,
            parent: read_le_at_dyn(data, offset, large_parent)?,
            permission_set: read_le_at_dyn(data, offset, large_blob)?,
        })
    }

    /// Decodes the action and parent columns.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the parent coded index has an invalid tag or a
    /// null row.
    pub fn to_owned(&self) -> Result<DeclSecurity> {
        let (target, row) = HasDeclSecurity::decode(self.parent)?;
        if row == 0 {
            return Err(malformed_error!(
                "DeclSecurity row {} has a null parent",
                self.rid
            ));
        }

        Ok(DeclSecurity {
            rid: self.rid,
            token: self.token,
            action: SecurityAction::from(self.action),
            parent: Token::from_parts(target.table(), row),
            permission_set: self.permission_set,
        })
    }
}

/// A decoded `DeclSecurity` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclSecurity {
    /// Row id, starting at 1
    pub rid: u32,
    /// Metadata token of this row
    pub token: Token,
    /// How the permission set is applied
    pub action: SecurityAction,
    /// The `TypeDef`, `MethodDef` or `Assembly` the permissions are attached to
    pub parent: Token,
    /// `#Blob` heap index of the permission set
    pub permission_set: u32,
}

impl DeclSecurity {
    /// Decodes the permission set of this row.
    ///
    /// # Errors
    /// Only lock contract violations are returned; see [`DeclSecurityReader`].
    pub fn attributes(&self, module: &ModuleDef) -> Result<SecurityAttributeList> {
        DeclSecurityReader::read_blob(module, self.permission_set)
    }

    /// `Demand` or `NonCasDemand`.
    #[must_use]
    pub fn is_demand(&self) -> bool {
        matches!(
            self.action,
            SecurityAction::Demand | SecurityAction::NonCasDemand
        )
    }

    /// `Assert`.
    #[must_use]
    pub fn is_assert(&self) -> bool {
        self.action == SecurityAction::Assert
    }

    /// `Deny`.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.action == SecurityAction::Deny
    }

    /// `LinkDemand` or `NonCasLinkDemand`.
    #[must_use]
    pub fn is_link_demand(&self) -> bool {
        matches!(
            self.action,
            SecurityAction::LinkDemand | SecurityAction::NonCasLinkDemand
        )
    }

    /// `InheritanceDemand` or `NonCasInheritance`.
    #[must_use]
    pub fn is_inheritance_demand(&self) -> bool {
        matches!(
            self.action,
            SecurityAction::InheritanceDemand | SecurityAction::NonCasInheritance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::streams::BlobHeapBuilder, utils::collections::OrderedList};

    #[test]
    fn crafted_short() {
        let data = vec![
            0x01, 0x01, // action
            0x02, 0x02, // parent
            0x03, 0x03, // permission_set
        ];

        let mut offset = 0;
        let row = DeclSecurityRaw::read_row(&data, &mut offset, 1, false, false).unwrap();

        assert_eq!(offset, DeclSecurityRaw::row_size(false, false) as usize);
        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x0E000001);
        assert_eq!(row.action, 0x0101);
        assert_eq!(row.permission_set, 0x303);

        let owned = row.to_owned().unwrap();
        assert_eq!(owned.parent, Token::new(128 | 0x20000000));
        assert_eq!(owned.action, SecurityAction::Unknown(0x0101));
    }

    #[test]
    fn crafted_long() {
        let data = vec![
            0x01, 0x01, // action
            0x02, 0x02, 0x02, 0x02, // parent
            0x03, 0x03, 0x03, 0x03, // permission_set
        ];

        let mut offset = 0;
        let row = DeclSecurityRaw::read_row(&data, &mut offset, 1, true, true).unwrap();

        assert_eq!(offset, 10);
        assert_eq!(row.permission_set, 0x3030303);
        assert_eq!(row.to_owned().unwrap().parent, Token::new(0x808080 | 0x20000000));
    }

    #[test]
    fn test_truncated_row() {
        let mut offset = 0;
        assert!(DeclSecurityRaw::read_row(&[0x01, 0x01, 0x02], &mut offset, 1, false, false)
            .is_err());
    }

    #[test]
    fn test_coded_index() {
        assert_eq!(HasDeclSecurity::TAG_BITS, 2);
        assert_eq!(
            HasDeclSecurity::decode(0x0D).unwrap(),
            (HasDeclSecurity::MethodDef, 3)
        );
        assert!(HasDeclSecurity::decode(0x07).is_err());

        for token in [Token(0x0200_0005), Token(0x0600_0001), Token(0x2000_0001)] {
            let coded = HasDeclSecurity::encode(token).unwrap();
            let (target, row) = HasDeclSecurity::decode(coded).unwrap();
            assert_eq!(Token::from_parts(target.table(), row), token);
        }
        assert!(HasDeclSecurity::encode(Token(0x0400_0001)).is_err());
    }

    #[test]
    fn test_null_parent() {
        let row = DeclSecurityRaw {
            rid: 1,
            token: Token(0x0E00_0001),
            offset: 0,
            action: 2,
            parent: 0x01,
            permission_set: 0,
        };
        assert!(row.to_owned().is_err());
    }

    #[test]
    fn test_attributes_and_predicates() {
        let mut heap = BlobHeapBuilder::new();
        let index = heap
            .add(&[0x2E, 0x01, 0x08, b'S', b'y', b's', b't', b'e', b'm', b'.', b'A', 0x01, 0x00])
            .unwrap();
        let module = ModuleDef::builder("Sample.dll")
            .blob_heap(heap.build())
            .build()
            .unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(&0x0005u16.to_le_bytes());
        data.extend_from_slice(&HasDeclSecurity::encode(Token(0x0600_0001)).unwrap().to_le_bytes()[..2]);
        data.extend_from_slice(&(index as u16).to_le_bytes());

        let mut offset = 0;
        let row = DeclSecurityRaw::read_row(&data, &mut offset, 4, false, false)
            .unwrap()
            .to_owned()
            .unwrap();

        assert_eq!(row.token, Token(0x0E00_0004));
        assert_eq!(row.parent, Token(0x0600_0001));
        assert!(row.is_link_demand());
        assert!(!row.is_demand() && !row.is_assert() && !row.is_deny());
        assert!(!row.is_inheritance_demand());

        let attributes = row.attributes(&module).unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes.to_vec()[0].type_full_name(), "System.A");
    }
}

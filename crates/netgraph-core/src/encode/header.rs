//! The header record (blob `0`).
//!
//! Layout:
//! - 1 byte: start marker (`NET64_START`, or `NET64_A_STAR_START` in A* mode)
//! - 1 byte: `NET_HEADER`
//! - 4 bytes: node count
//! - 1 byte: `NET_CODE` or `NET_ID`
//! - 1 byte: max code length incl. NUL (0 for integer ids)
//! - five named strings, each `marker, u16 len, bytes, NUL`: table, from
//!   column, to column, geometry column, name column (absent = len 1)
//! - A* only: `NET_A_STAR_COEFF` + f64
//! - 1 byte: `NET_END`

use serde::Serialize;

use super::{
    EncodeError, NET_A_STAR_COEFF, NET_CODE, NET_END, NET_FROM, NET_GEOM, NET_HEADER, NET_ID,
    NET_NAME, NET_TABLE, NET_TO, NET64_A_STAR_START, NET64_START,
};
use crate::identity::IdentityKind;

/// Network-wide metadata stored ahead of the node blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkHeader {
    pub node_count: u32,
    pub kind: IdentityKind,
    /// Code width including NUL; zero for integer ids.
    pub max_code_len: u8,
    pub table: String,
    pub from_column: String,
    pub to_column: String,
    pub geometry_column: Option<String>,
    pub name_column: Option<String>,
    /// Present exactly when the artifact supports A*.
    pub a_star_coefficient: Option<f64>,
}

impl NetworkHeader {
    #[must_use]
    pub const fn a_star(&self) -> bool {
        self.a_star_coefficient.is_some()
    }

    /// Serialize the header record.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::NameTooLong`] if a name does not fit its
    /// 16-bit length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(64 + self.table.len() + self.from_column.len());
        out.push(if self.a_star() {
            NET64_A_STAR_START
        } else {
            NET64_START
        });
        out.push(NET_HEADER);
        out.extend_from_slice(&self.node_count.to_le_bytes());
        match self.kind {
            IdentityKind::Code => {
                out.push(NET_CODE);
                out.push(self.max_code_len);
            }
            IdentityKind::Integer => {
                out.push(NET_ID);
                out.push(0);
            }
        }
        put_name(&mut out, NET_TABLE, "table", Some(&self.table))?;
        put_name(&mut out, NET_FROM, "from column", Some(&self.from_column))?;
        put_name(&mut out, NET_TO, "to column", Some(&self.to_column))?;
        put_name(&mut out, NET_GEOM, "geometry column", self.geometry_column.as_deref())?;
        put_name(&mut out, NET_NAME, "name column", self.name_column.as_deref())?;
        if let Some(coeff) = self.a_star_coefficient {
            out.push(NET_A_STAR_COEFF);
            out.extend_from_slice(&coeff.to_le_bytes());
        }
        out.push(NET_END);
        Ok(out)
    }
}

fn put_name(
    out: &mut Vec<u8>,
    marker: u8,
    field: &'static str,
    name: Option<&str>,
) -> Result<(), EncodeError> {
    let name = name.unwrap_or("");
    let len = u16::try_from(name.len() + 1).map_err(|_| EncodeError::NameTooLong {
        field,
        len: name.len(),
    })?;
    out.push(marker);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    Ok(())
}

//! Connections (`spec.md` §3): a binding of one source output field
//! to one destination input field. The source and destination blocks
//! themselves are implied by the edge `connect()` installs this
//! connection on, not carried in the connection itself.

use crate::error::{FlowError, FlowResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub src_field: String,
    pub dst_field: String,
}

impl Connection {
    pub fn new(src_field: impl Into<String>, dst_field: impl Into<String>) -> FlowResult<Self> {
        let src_field = src_field.into();
        let dst_field = dst_field.into();

        if !src_field.starts_with("out_") {
            return Err(FlowError::structural(format!(
                "source field '{src_field}' must start with 'out_'"
            )));
        }

        if !dst_field.starts_with("in_") {
            return Err(FlowError::structural(format!(
                "destination field '{dst_field}' must start with 'in_'"
            )));
        }

        Ok(Self {
            src_field,
            dst_field,
        })
    }
}

//! Typed object materialization on top of `read`.
//!
//! # Design
//! The caller supplies a construction contract: a function from one
//! `Record` (plus caller-provided extra values) to one typed object. There
//! is no runtime type lookup. Whatever goes wrong, a failed `read`, a
//! missing record, or a contract error, surfaces as a single
//! `MaterializationError`, and the result is all-or-nothing.
//!
//! Extras are handed to the contract next to the record rather than being
//! injected into it, so the record always mirrors what the server sent.

use std::collections::HashSet;
use std::fmt;

use oerp_xmlrpc::Value;
use serde::de::DeserializeOwned;

use crate::connection::Connection;
use crate::error::MaterializationError;
use crate::transport::Transport;
use crate::types::{Record, RecordId};

/// A type that can be built from one record.
pub trait FromRecord: Sized {
    type Error: fmt::Display;

    fn from_record(record: &Record, extras: &[Value]) -> Result<Self, Self::Error>;
}

/// Apply `contract` to records already read for `ids`.
///
/// Fails on the first requested id that has no record, then on the first
/// record the contract rejects.
pub fn materialize<R, E, F>(
    model: &str,
    ids: &[RecordId],
    records: &[Record],
    extras: &[Value],
    contract: F,
) -> Result<Vec<R>, MaterializationError>
where
    F: Fn(&Record, &[Value]) -> Result<R, E>,
    E: fmt::Display,
{
    let returned: HashSet<RecordId> = records.iter().filter_map(Record::id).collect();
    if let Some(missing) = ids.iter().find(|id| !returned.contains(*id)) {
        return Err(MaterializationError::MissingRecord(*missing));
    }

    records
        .iter()
        .map(|record| {
            contract(record, extras).map_err(|e| MaterializationError::Construction {
                model: model.to_string(),
                id: record.id(),
                message: e.to_string(),
            })
        })
        .collect()
}

impl<T: Transport> Connection<T> {
    /// Read `ids` and build one `R` per requested id with `contract`, in the
    /// order of `ids`. A repeated id yields one object per occurrence.
    pub fn browse<R, E, F>(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
        extras: &[Value],
        contract: F,
    ) -> Result<Vec<R>, MaterializationError>
    where
        F: Fn(&Record, &[Value]) -> Result<R, E>,
        E: fmt::Display,
    {
        let records = self
            .read(model, ids, fields)
            .map_err(MaterializationError::Read)?;
        materialize(model, ids, &records, extras, contract)
    }

    /// `browse` with the contract taken from `R: FromRecord`.
    pub fn browse_as<R: FromRecord>(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
        extras: &[Value],
    ) -> Result<Vec<R>, MaterializationError> {
        self.browse(model, ids, fields, extras, R::from_record)
    }

    /// `browse` with serde deserialization as the contract.
    pub fn browse_deserialize<R: DeserializeOwned>(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> Result<Vec<R>, MaterializationError> {
        self.browse(model, ids, fields, &[], |record, _| record.deserialize::<R>())
    }
}

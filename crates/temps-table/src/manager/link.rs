//! Link resolution.
//!
//! Inbound: a filter on a linked column is answered by the remote table and
//! turned into an IN condition on the local join column. Outbound: a linked
//! output column is filled from the remote table after the local rows are
//! fetched.

use super::QueryManager;
use crate::codec;
use crate::driver::DriverCondition;
use crate::error::{Result, TableError};
use crate::operator::builtin;
use crate::schema::{ColumnDescriptor, Link, TableMetaData};
use crate::session::Session;
use crate::template::{Condition, Template};
use crate::value::{RawValue, TableRow, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Convert a value of one column into a value typed for `target`
fn retype(target: &ColumnDescriptor, value: &Value) -> Result<Value> {
    match value.value_type() {
        Some(vt) if vt == target.value_type => Ok(value.clone()),
        _ => codec::parse_text(target, &value.to_string()),
    }
}

fn remote_column<'m>(remote: &'m TableMetaData, column_id: &str) -> Result<&'m Arc<ColumnDescriptor>> {
    remote
        .column(column_id)
        .ok_or_else(|| TableError::invalid_column(&remote.id, column_id))
}

impl QueryManager {
    /// Translate filters on inbound linked columns into local conditions.
    ///
    /// Returns `None` when any remote lookup matched no rows, in which case
    /// the outer query cannot match either.
    pub(super) async fn resolve_inbound(
        &self,
        session: &Session,
        meta: &TableMetaData,
        conditions: &[&Condition],
    ) -> Result<Option<Vec<DriverCondition>>> {
        let mut groups: Vec<(&Link, Vec<&Condition>)> = Vec::new();
        for &condition in conditions {
            let column = meta
                .column(&condition.column_id)
                .ok_or_else(|| TableError::invalid_column(&meta.id, &condition.column_id))?;
            let Some(link) = column.outbound_link() else {
                continue;
            };
            let same_group = |l: &&Link| {
                l.remote_table_id == link.remote_table_id
                    && l.local_column_id == link.local_column_id
                    && l.remote_search_column_id == link.remote_search_column_id
            };
            match groups.iter_mut().find(|(l, _)| same_group(l)) {
                Some((_, members)) => members.push(condition),
                None => groups.push((link, vec![condition])),
            }
        }

        let mut translated = Vec::with_capacity(groups.len());
        for (link, members) in groups {
            let remote = self.context.tables.find(&link.remote_table_id)?;
            let local = meta
                .column(&link.local_column_id)
                .ok_or_else(|| TableError::invalid_column(&meta.id, &link.local_column_id))?;

            let mut sub = Template::temporary(&remote.id)
                .output([link.remote_search_column_id.clone()])
                .with_page(0, 0);
            if link.remote_value_column_id != link.remote_search_column_id {
                sub = sub.output([link.remote_value_column_id.clone()]);
            }
            for member in &members {
                sub = sub.with_condition(Condition {
                    column_id: link.remote_value_column_id.clone(),
                    operator_id: member.operator_id.clone(),
                    values: member.values.clone(),
                });
            }

            let result = self.find_rows_inner(session, sub, true).await?;
            if result.rows.is_empty() {
                debug!("Link {} matched no rows", link);
                return Ok(None);
            }

            let mut seen = HashSet::new();
            let mut keys: Vec<RawValue> = Vec::new();
            for row in &result.rows {
                let Some(value) = row.value(&link.remote_search_column_id) else {
                    continue;
                };
                if !seen.insert(value.to_string()) {
                    continue;
                }
                keys.push(codec::to_raw(local, &retype(local, value)?)?);
            }
            debug!(
                "Link {} resolved to {} keys on {}.{}",
                link,
                keys.len(),
                meta.id,
                local.id
            );
            translated.push(DriverCondition::new(&local.id, builtin::IN, keys));
        }
        Ok(Some(translated))
    }

    /// Fill outbound linked cells from their remote tables
    pub(super) async fn resolve_outbound(&self, session: &Session, meta: &TableMetaData, rows: &mut [TableRow]) -> Result<()> {
        let Some(first) = rows.first() else {
            return Ok(());
        };
        let linked: Vec<Arc<ColumnDescriptor>> = first
            .cells
            .iter()
            .filter_map(|cell| meta.column(&cell.column_id))
            .filter(|column| column.outbound_link().is_some())
            .cloned()
            .collect();

        for column in linked {
            let Some(link) = column.outbound_link() else {
                continue;
            };
            let remote = self.context.tables.find(&link.remote_table_id)?;
            let search = remote_column(&remote, &link.remote_search_column_id)?;
            remote_column(&remote, &link.remote_value_column_id)?;

            let lookup = if search.supports_filter(builtin::IN) {
                self.lookup_batched(session, link, search, rows).await?
            } else if search.supports_filter(builtin::EQ) {
                self.lookup_each(session, link, search, rows).await?
            } else {
                return Err(TableError::TableColumnNotLinkable {
                    remote_table: remote.id.clone(),
                    search_column: search.id.clone(),
                });
            };

            let empty = codec::empty_value(&column);
            for row in rows.iter_mut() {
                let key = row.value(&link.local_column_id).map(|v| v.to_string());
                let found = key.as_ref().and_then(|k| lookup.get(k)).cloned();
                if found.is_none() && self.config.link_lookup_log_missing {
                    warn!(
                        "No {} value for {} = {:?} in row {}",
                        link,
                        link.local_column_id,
                        key.as_deref().unwrap_or_default(),
                        row.id
                    );
                }
                let value = found.unwrap_or_else(|| empty.clone());
                if let Some(cell) = row.cells.iter_mut().find(|c| c.column_id == column.id) {
                    cell.values = vec![value.clone()];
                    cell.value = value;
                }
            }
        }
        Ok(())
    }

    fn local_keys(link: &Link, search: &ColumnDescriptor, rows: &[TableRow]) -> Result<Vec<Value>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for row in rows {
            let Some(value) = row.value(&link.local_column_id) else {
                continue;
            };
            if value.is_null() || !seen.insert(value.to_string()) {
                continue;
            }
            keys.push(retype(search, value)?);
        }
        Ok(keys)
    }

    /// One IN sub-query over every distinct local key
    async fn lookup_batched(
        &self,
        session: &Session,
        link: &Link,
        search: &ColumnDescriptor,
        rows: &[TableRow],
    ) -> Result<HashMap<String, Value>> {
        let keys = Self::local_keys(link, search, rows)?;
        let mut lookup = HashMap::new();
        if keys.is_empty() {
            return Ok(lookup);
        }

        let sub = Template::temporary(&link.remote_table_id)
            .output([link.remote_search_column_id.clone()])
            .filter(&link.remote_search_column_id, builtin::IN, keys)
            .with_page(0, 0);
        let sub = with_value_column(sub, link);

        for row in self.find_rows_inner(session, sub, true).await?.rows {
            if let (Some(key), Some(value)) = (
                row.value(&link.remote_search_column_id),
                row.value(&link.remote_value_column_id),
            ) {
                lookup.insert(key.to_string(), value.clone());
            }
        }
        Ok(lookup)
    }

    /// One EQ sub-query per row, repeated keys included
    async fn lookup_each(
        &self,
        session: &Session,
        link: &Link,
        search: &ColumnDescriptor,
        rows: &[TableRow],
    ) -> Result<HashMap<String, Value>> {
        let mut lookup = HashMap::new();
        for row in rows {
            let Some(local) = row.value(&link.local_column_id) else {
                continue;
            };
            if local.is_null() {
                continue;
            }
            let key = retype(search, local)?;
            let sub = Template::temporary(&link.remote_table_id)
                .output([link.remote_search_column_id.clone()])
                .filter(&link.remote_search_column_id, builtin::EQ, vec![key.clone()])
                .with_page(0, 1);
            let sub = with_value_column(sub, link);

            let result = self.find_rows_inner(session, sub, true).await?;
            if let Some(value) = result
                .rows
                .first()
                .and_then(|row| row.value(&link.remote_value_column_id))
            {
                lookup.insert(key.to_string(), value.clone());
            }
        }
        Ok(lookup)
    }
}

fn with_value_column(template: Template, link: &Link) -> Template {
    if link.remote_value_column_id == link.remote_search_column_id {
        template
    } else {
        template.output([link.remote_value_column_id.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn test_retype_between_column_types() {
        let int_col = ColumnDescriptor::test_column("Id", ValueType::Int);
        let str_col = ColumnDescriptor::test_column("Code", ValueType::String);

        assert_eq!(retype(&int_col, &Value::string("42")).unwrap(), Value::Int(42));
        assert_eq!(retype(&str_col, &Value::Int(42)).unwrap(), Value::string("42"));
        assert_eq!(retype(&str_col, &Value::string("x")).unwrap(), Value::string("x"));
        assert!(retype(&int_col, &Value::string("x")).is_err());
    }
}

//! The read-only SQL passthrough. SELECT statements go through
//! unchanged; any other verb is rejected before touching the database.

use async_trait::async_trait;
use serde_json::{json, Value};

use lattice_core::constants::MAX_LIST_LIMIT;
use lattice_core::{LatticeError, LatticeResult};

use crate::context::ToolEnv;
use crate::fs::str_arg;
use crate::registry::{Tool, ToolTag};

pub struct QueryTool;

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &'static str {
        "query"
    }
    fn description(&self) -> &'static str {
        "Run a read-only SELECT against the graph database"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {"type": "string", "minLength": 1}
            },
            "required": ["sql"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph, ToolTag::Admin]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let sql = str_arg(&args, "sql")?.trim().to_string();
        let first_word = sql
            .split_whitespace()
            .next()
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();
        if first_word != "SELECT" {
            return Err(LatticeError::invalid_argument(format!(
                "only SELECT queries pass through, got '{first_word}'"
            )));
        }

        env.store.with_reader(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| LatticeError::invalid_argument(format!("bad query: {e}")))?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let mut rows = stmt
                .query([])
                .map_err(|e| LatticeError::storage(e.to_string()))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(|e| LatticeError::storage(e.to_string()))? {
                let mut object = serde_json::Map::new();
                for (index, column) in columns.iter().enumerate() {
                    object.insert(column.clone(), column_value(row, index));
                }
                out.push(Value::Object(object));
                if out.len() >= MAX_LIST_LIMIT {
                    break;
                }
            }
            Ok(json!({ "columns": columns, "rows": out }))
        })
    }
}

fn column_value(row: &rusqlite::Row<'_>, index: usize) -> Value {
    use rusqlite::types::ValueRef;
    match row.get_ref(index) {
        Ok(ValueRef::Null) => Value::Null,
        Ok(ValueRef::Integer(i)) => json!(i),
        Ok(ValueRef::Real(f)) => json!(f),
        Ok(ValueRef::Text(t)) => json!(String::from_utf8_lossy(t)),
        Ok(ValueRef::Blob(b)) => json!(format!("<{} bytes>", b.len())),
        Err(_) => Value::Null,
    }
}

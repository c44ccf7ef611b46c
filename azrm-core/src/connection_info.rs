//! Connection info of a data migration project endpoint
//!
//! The management API returns one of several shapes discriminated by a `type`
//! field. Unknown discriminators fail to decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::provider::{ProviderError, ProviderResult};
use crate::resource::Value;
use crate::validate;

pub const SQL: &str = "SqlConnectionInfo";
pub const MY_SQL: &str = "MySqlConnectionInfo";
pub const POSTGRE_SQL: &str = "PostgreSqlConnectionInfo";
pub const MONGO_DB: &str = "MongoDbConnectionInfo";

pub const AUTHENTICATION_TYPES: &[&str] = &[
    "ActiveDirectoryIntegrated",
    "ActiveDirectoryPassword",
    "None",
    "SqlAuthentication",
    "WindowsAuthentication",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConnectionInfo {
    #[serde(rename = "SqlConnectionInfo")]
    Sql(SqlConnectionInfo),
    #[serde(rename = "MySqlConnectionInfo")]
    MySql(MySqlConnectionInfo),
    #[serde(rename = "PostgreSqlConnectionInfo")]
    PostgreSql(PostgreSqlConnectionInfo),
    #[serde(rename = "MongoDbConnectionInfo")]
    MongoDb(MongoDbConnectionInfo),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlConnectionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_settings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt_connection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_server_certificate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MySqlConnectionInfo {
    pub server_name: String,
    pub port: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgreSqlConnectionInfo {
    pub server_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    pub port: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoDbConnectionInfo {
    pub connection_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn optional_string(block: &HashMap<String, Value>, key: &str) -> ProviderResult<Option<String>> {
    match block.get(key).and_then(Value::as_str) {
        Some(s) => {
            validate::no_empty_strings(key, s)?;
            Ok(Some(s.to_string()))
        }
        None => Ok(None),
    }
}

fn required_string(block: &HashMap<String, Value>, key: &str) -> ProviderResult<String> {
    optional_string(block, key)?
        .ok_or_else(|| ProviderError::InvalidConfig(format!("connection info: `{}` is required", key)))
}

fn required_port(block: &HashMap<String, Value>) -> ProviderResult<i64> {
    match block.get("port").and_then(Value::as_int) {
        Some(port) if (1..=65535).contains(&port) => Ok(port),
        _ => Err(ProviderError::InvalidConfig(
            "connection info: `port` must be between 1 and 65535".to_string(),
        )),
    }
}

fn insert_some(out: &mut HashMap<String, Value>, key: &str, value: &Option<impl Clone + Into<Value>>) {
    if let Some(v) = value {
        out.insert(key.to_string(), v.clone().into());
    }
}

impl ConnectionInfo {
    /// Discriminator sent on the wire
    pub fn type_name(&self) -> &'static str {
        match self {
            ConnectionInfo::Sql(_) => SQL,
            ConnectionInfo::MySql(_) => MY_SQL,
            ConnectionInfo::PostgreSql(_) => POSTGRE_SQL,
            ConnectionInfo::MongoDb(_) => MONGO_DB,
        }
    }

    /// Build from a configuration block; `type` defaults to SQL
    pub fn expand(block: &HashMap<String, Value>) -> ProviderResult<Self> {
        let type_name = block.get("type").and_then(Value::as_str).unwrap_or(SQL);
        let info = match type_name {
            SQL => {
                let authentication = optional_string(block, "authentication")?;
                if let Some(auth) = &authentication {
                    validate::one_of("authentication", auth, AUTHENTICATION_TYPES)?;
                }
                let platform = optional_string(block, "platform")?;
                if let Some(platform) = &platform {
                    validate::one_of("platform", platform, &["SqlOnPrem"])?;
                }
                ConnectionInfo::Sql(SqlConnectionInfo {
                    additional_settings: optional_string(block, "additional_settings")?,
                    authentication,
                    data_source: optional_string(block, "data_source")?,
                    encrypt_connection: block.get("encrypt_connection").and_then(Value::as_bool),
                    password: optional_string(block, "password")?,
                    platform,
                    trust_server_certificate: block
                        .get("trust_server_certificate")
                        .and_then(Value::as_bool),
                    user_name: optional_string(block, "user_name")?,
                })
            }
            MY_SQL => ConnectionInfo::MySql(MySqlConnectionInfo {
                server_name: required_string(block, "server_name")?,
                port: required_port(block)?,
                user_name: optional_string(block, "user_name")?,
                password: optional_string(block, "password")?,
            }),
            POSTGRE_SQL => ConnectionInfo::PostgreSql(PostgreSqlConnectionInfo {
                server_name: required_string(block, "server_name")?,
                database_name: optional_string(block, "database_name")?,
                port: required_port(block)?,
                user_name: optional_string(block, "user_name")?,
                password: optional_string(block, "password")?,
            }),
            MONGO_DB => ConnectionInfo::MongoDb(MongoDbConnectionInfo {
                connection_string: required_string(block, "connection_string")?,
                user_name: optional_string(block, "user_name")?,
                password: optional_string(block, "password")?,
            }),
            other => {
                return Err(ProviderError::InvalidConfig(format!(
                    "connection info: unknown type {:?}",
                    other
                )));
            }
        };
        Ok(info)
    }

    /// Attribute block for this connection info, including its `type`
    pub fn flatten(&self) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        out.insert("type".to_string(), Value::from(self.type_name()));
        match self {
            ConnectionInfo::Sql(sql) => {
                insert_some(&mut out, "additional_settings", &sql.additional_settings);
                insert_some(&mut out, "authentication", &sql.authentication);
                insert_some(&mut out, "data_source", &sql.data_source);
                insert_some(&mut out, "encrypt_connection", &sql.encrypt_connection);
                insert_some(&mut out, "password", &sql.password);
                insert_some(&mut out, "platform", &sql.platform);
                insert_some(&mut out, "trust_server_certificate", &sql.trust_server_certificate);
                insert_some(&mut out, "user_name", &sql.user_name);
            }
            ConnectionInfo::MySql(my) => {
                out.insert("server_name".to_string(), Value::from(my.server_name.clone()));
                out.insert("port".to_string(), Value::from(my.port));
                insert_some(&mut out, "user_name", &my.user_name);
                insert_some(&mut out, "password", &my.password);
            }
            ConnectionInfo::PostgreSql(pg) => {
                out.insert("server_name".to_string(), Value::from(pg.server_name.clone()));
                insert_some(&mut out, "database_name", &pg.database_name);
                out.insert("port".to_string(), Value::from(pg.port));
                insert_some(&mut out, "user_name", &pg.user_name);
                insert_some(&mut out, "password", &pg.password);
            }
            ConnectionInfo::MongoDb(mongo) => {
                out.insert(
                    "connection_string".to_string(),
                    Value::from(mongo.connection_string.clone()),
                );
                insert_some(&mut out, "user_name", &mongo.user_name);
                insert_some(&mut out, "password", &mongo.password);
            }
        }
        out
    }

    /// Decode the wire form returned by the management API
    pub fn from_json(id: &str, json: &serde_json::Value) -> ProviderResult<Self> {
        serde_json::from_value(json.clone()).map_err(|e| ProviderError::Decode {
            id: id.to_string(),
            message: format!("connection info: {}", e),
        })
    }

    pub fn to_json(&self) -> ProviderResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| ProviderError::Decode {
            id: String::new(),
            message: format!("connection info: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_expand_defaults_to_sql() {
        let info = ConnectionInfo::expand(&block(&[
            ("data_source", Value::from("sqlserver.example.com")),
            ("authentication", Value::from("SqlAuthentication")),
            ("encrypt_connection", Value::from(true)),
        ]))
        .unwrap();

        assert_eq!(
            info,
            ConnectionInfo::Sql(SqlConnectionInfo {
                data_source: Some("sqlserver.example.com".to_string()),
                authentication: Some("SqlAuthentication".to_string()),
                encrypt_connection: Some(true),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_expand_rejects_bad_values() {
        assert!(ConnectionInfo::expand(&block(&[("authentication", Value::from("Kerberos"))])).is_err());
        assert!(ConnectionInfo::expand(&block(&[("user_name", Value::from(""))])).is_err());
        assert!(ConnectionInfo::expand(&block(&[("type", Value::from("OracleConnectionInfo"))])).is_err());
        assert!(ConnectionInfo::expand(&block(&[
            ("type", Value::from(MY_SQL)),
            ("server_name", Value::from("db")),
            ("port", Value::from(0i64)),
        ]))
        .is_err());
    }

    #[test]
    fn test_wire_form_is_tagged() {
        let info = ConnectionInfo::PostgreSql(PostgreSqlConnectionInfo {
            server_name: "pg.example.com".to_string(),
            database_name: Some("app".to_string()),
            port: 5432,
            ..Default::default()
        });

        assert_eq!(
            info.to_json().unwrap(),
            json!({
                "type": "PostgreSqlConnectionInfo",
                "serverName": "pg.example.com",
                "databaseName": "app",
                "port": 5432,
            })
        );
    }

    #[test]
    fn test_unknown_wire_type_is_decode_error() {
        let err = ConnectionInfo::from_json("id1", &json!({"type": "OracleConnectionInfo"})).unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
    }

    #[test]
    fn test_flatten_every_variant() {
        let variants = vec![
            ConnectionInfo::Sql(SqlConnectionInfo {
                user_name: Some("sa".to_string()),
                ..Default::default()
            }),
            ConnectionInfo::MySql(MySqlConnectionInfo {
                server_name: "mysql".to_string(),
                port: 3306,
                ..Default::default()
            }),
            ConnectionInfo::PostgreSql(PostgreSqlConnectionInfo {
                server_name: "pg".to_string(),
                port: 5432,
                ..Default::default()
            }),
            ConnectionInfo::MongoDb(MongoDbConnectionInfo {
                connection_string: "mongodb://host".to_string(),
                ..Default::default()
            }),
        ];

        for info in variants {
            let flat = info.flatten();
            assert_eq!(flat.get("type").and_then(Value::as_str), Some(info.type_name()));
            assert_eq!(ConnectionInfo::expand(&flat).unwrap(), info);

            let wire = info.to_json().unwrap();
            assert_eq!(ConnectionInfo::from_json("id", &wire).unwrap(), info);
        }
    }
}

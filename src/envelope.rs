//! 统一的响应结构
//!
//! 所有 HTTP 响应都是 `{"result": ..., "error": ...}`，两者有且只有一个非空。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

/// 错误信息缺失时使用的默认提示
pub const DEFAULT_ERROR_MESSAGE: &str = "Invalid input.";
/// 未分类错误对外展示的提示，不包含任何内部细节
pub const SERVER_ERROR_MESSAGE: &str = "A server error occurred.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub result: Option<Value>,
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self { result: Some(wrap_success(data)), error: None }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self { result: None, error: Some(error) }
    }
}

/// 对外展示的错误，`extra` 通常是出错的字段名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    pub extra: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), extra: None }
    }
}

/// 包装成功响应的数据
///
/// - 字符串：`{"message": data, "data": []}`
/// - 列表：`{"message": null, "data": data}`
/// - 对象：取出 `message` 字段，其余部分作为 `data` 的唯一元素；已经包装过的对象原样返回
/// - 其他：原样返回
pub fn wrap_success(data: Value) -> Value {
    match data {
        Value::String(message) => json!({ "message": message, "data": [] }),
        Value::Array(items) => json!({ "message": null, "data": items }),
        Value::Object(mut map) => {
            if is_wrapped(&map) {
                return Value::Object(map);
            }
            let message = map.remove("message").unwrap_or(Value::Null);
            json!({ "message": message, "data": [map] })
        }
        other => other,
    }
}

fn is_wrapped(map: &Map<String, Value>) -> bool {
    map.len() == 2
        && map.get("data").is_some_and(Value::is_array)
        && map.get("message").is_some_and(|m| m.is_string() || m.is_null())
}

/// 各种来源的错误细节
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// 单条错误信息
    Message(String),
    /// 已经带有 message/detail 与 extra 的错误
    Detail { message: Option<String>, extra: Option<String> },
    /// 按字段组织的校验错误，可以嵌套
    Fields(Vec<(String, FieldError)>),
    /// 多个候选错误，取第一个非空的
    Candidates(Vec<ErrorDetail>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    Messages(Vec<String>),
    Nested(Vec<(String, FieldError)>),
}

impl ErrorDetail {
    /// 单个字段的单条校验错误
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fields(vec![(name.into(), FieldError::Messages(vec![message.into()]))])
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Message(message) => message.is_empty(),
            Self::Detail { message, extra } => message.is_none() && extra.is_none(),
            Self::Fields(fields) => fields.is_empty(),
            Self::Candidates(candidates) => candidates.iter().all(Self::is_empty),
        }
    }

    /// 将错误细节规整为 `{"message", "extra"}`
    pub fn normalize(self) -> ErrorBody {
        match self {
            Self::Message(message) => ErrorBody { message, extra: None },
            Self::Detail { message, extra } => {
                ErrorBody { message: message.unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.into()), extra }
            }
            Self::Fields(fields) => normalize_fields(fields),
            Self::Candidates(candidates) => candidates
                .into_iter()
                .find(|c| !c.is_empty())
                .map(Self::normalize)
                .unwrap_or_else(|| ErrorBody::new(SERVER_ERROR_MESSAGE)),
        }
    }

    /// 从任意 JSON 错误载荷构造，用于包装框架或中间件产生的错误
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(message) => Self::Message(message),
            Value::Array(items) => Self::Candidates(items.into_iter().map(Self::from_value).collect()),
            Value::Object(mut map) => {
                let message = take_string(&mut map, "message").or_else(|| take_string(&mut map, "detail"));
                let extra = take_string(&mut map, "extra");
                if message.is_some() || extra.is_some() {
                    return Self::Detail { message, extra };
                }
                Self::Fields(map.into_iter().map(|(k, v)| (k, FieldError::from_value(v))).collect())
            }
            Value::Null => Self::Message(String::new()),
            other => Self::Message(other.to_string()),
        }
    }
}

impl FieldError {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                Self::Nested(map.into_iter().map(|(k, v)| (k, Self::from_value(v))).collect())
            }
            Value::Array(items) => Self::Messages(items.into_iter().map(value_to_string).collect()),
            other => Self::Messages(vec![value_to_string(other)]),
        }
    }
}

/// 沿最后一个字段一路深入到最内层，字段名作为 `extra`，第一条信息作为 `message`
fn normalize_fields(mut fields: Vec<(String, FieldError)>) -> ErrorBody {
    loop {
        let Some((name, error)) = fields.pop() else {
            return ErrorBody::new(DEFAULT_ERROR_MESSAGE);
        };
        match error {
            FieldError::Nested(nested) if !nested.is_empty() => fields = nested,
            FieldError::Nested(_) => return ErrorBody { message: DEFAULT_ERROR_MESSAGE.into(), extra: Some(name) },
            FieldError::Messages(messages) => {
                let message = messages.into_iter().next().unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.into());
                return ErrorBody { message, extra: Some(name) };
            }
        }
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    let value = match map.remove(key)? {
        // 列表只取第一条
        Value::Array(items) => items.into_iter().next()?,
        value => value,
    };
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        value => Some(value_to_string(value)),
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

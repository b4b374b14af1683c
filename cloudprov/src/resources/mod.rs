//! Resource implementations

pub mod devicefarm_upload;
pub mod sagemaker_endpoint_configuration;

pub use devicefarm_upload::DeviceFarmUploadResource;
pub use sagemaker_endpoint_configuration::EndpointConfigurationResource;

use crate::api::ApiError;
use std::collections::HashMap;
use tfrecon::{Dynamic, TfreconError};

/// Converts an API failure into the framework taxonomy, naming the object
/// for not-found errors so lifecycle messages stay readable.
pub(crate) fn api_error(type_name: &str, id: &str, err: ApiError) -> TfreconError {
    if err.is_not_found() {
        return TfreconError::not_found(type_name, id);
    }
    err.into()
}

pub(crate) fn field<'a>(obj: &'a Dynamic, key: &str) -> &'a Dynamic {
    const NULL: &Dynamic = &Dynamic::Null;
    obj.as_map().and_then(|m| m.get(key)).unwrap_or(NULL)
}

pub(crate) fn string_field(obj: &Dynamic, key: &str) -> Option<String> {
    field(obj, key)
        .as_string()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn int_field(obj: &Dynamic, key: &str) -> Option<i64> {
    field(obj, key).as_number().map(|n| n as i64)
}

pub(crate) fn number_field(obj: &Dynamic, key: &str) -> Option<f64> {
    field(obj, key).as_number()
}

pub(crate) fn bool_field(obj: &Dynamic, key: &str) -> Option<bool> {
    field(obj, key).as_bool()
}

pub(crate) fn string_list_field(obj: &Dynamic, key: &str) -> Option<Vec<String>> {
    let items = field(obj, key).as_list()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_string().map(str::to_string))
            .collect(),
    )
}

pub(crate) fn string_map_field(obj: &Dynamic, key: &str) -> HashMap<String, String> {
    as_string_map(field(obj, key))
}

pub(crate) fn as_string_map(value: &Dynamic) -> HashMap<String, String> {
    value
        .as_map()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_string().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Elements of a nested block list; absent blocks have none
pub(crate) fn blocks<'a>(obj: &'a Dynamic, key: &str) -> &'a [Dynamic] {
    field(obj, key).as_list().unwrap_or(&[])
}

pub(crate) fn first_block<'a>(obj: &'a Dynamic, key: &str) -> Option<&'a Dynamic> {
    blocks(obj, key).first()
}

pub(crate) fn opt_string(value: Option<&str>) -> Dynamic {
    value.map_or(Dynamic::Null, Dynamic::string)
}

pub(crate) fn opt_int(value: Option<i64>) -> Dynamic {
    value.map_or(Dynamic::Null, |n| Dynamic::Number(n as f64))
}

pub(crate) fn opt_number(value: Option<f64>) -> Dynamic {
    value.map_or(Dynamic::Null, Dynamic::Number)
}

pub(crate) fn opt_bool(value: Option<bool>) -> Dynamic {
    value.map_or(Dynamic::Null, Dynamic::Bool)
}

pub(crate) fn opt_string_list(value: Option<&Vec<String>>) -> Dynamic {
    value.map_or(Dynamic::Null, |items| {
        Dynamic::List(items.iter().map(Dynamic::string).collect())
    })
}

/// A single-element block list, or Null when the block is absent
pub(crate) fn opt_block(value: Option<Dynamic>) -> Dynamic {
    value.map_or(Dynamic::Null, |v| Dynamic::List(vec![v]))
}

pub(crate) fn string_map(value: &HashMap<String, String>) -> Dynamic {
    if value.is_empty() {
        return Dynamic::Null;
    }
    Dynamic::Map(
        value
            .iter()
            .map(|(k, v)| (k.clone(), Dynamic::string(v)))
            .collect(),
    )
}

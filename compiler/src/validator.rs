use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::DaliError;
use crate::types::{DataTypeSpec, PACKED};
use crate::utils::{kind_of, quote};

lazy_static! {
    static ref OID_NAME_RX: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();
}

pub const REQUIRED_ATTRS: [&str; 7] = [
    "oid", "data_type", "service", "description", "op", "source", "request",
];
pub const WRITE_TYPES: [&str; 4] = ["w1", "w2", "w4", "C"];

/// Element kind governing the rules applied to a struct's items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementKind {
    /// Items are bit fields packed inside a larger word.
    BitPack,
    /// Items are independently typed sub-fields.
    Packed,
    /// Items share a scalar element type.
    Scalar(char),
}

impl ElementKind {
    fn from_code(code: char) -> ElementKind {
        if code == 'b' {
            ElementKind::BitPack
        } else {
            ElementKind::Scalar(code)
        }
    }
}

/// Walks every oid definition in the document and enforces the structural
/// and semantic rules of the register language. The first violation aborts
/// the whole run; there is no partial validation report.
pub fn validate_document(doc: &Value) -> Result<(), DaliError> {
    let oids = doc
        .get("oids")
        .ok_or_else(|| DaliError::schema("document", "missing 'oids' attribute"))?;
    let oids = oids
        .as_array()
        .ok_or_else(|| DaliError::schema("document", "'oids' attribute must be a sequence"))?;

    for oid_def in oids {
        validate_oid_def(oid_def)?;
    }
    Ok(())
}

fn validate_oid_def(oid_def: &Value) -> Result<(), DaliError> {
    let name = oid_def
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| DaliError::schema("<unnamed>", "missing name in oid definition"))?;
    info!("checking oid {}", name);

    for attr in REQUIRED_ATTRS {
        if oid_def.get(attr).is_none() {
            return Err(DaliError::schema(
                name,
                format!("missing required attribute {}", quote(attr)),
            ));
        }
    }

    if !OID_NAME_RX.is_match(name) {
        return Err(DaliError::schema(name, "invalid characters in oid name"));
    }

    // A real data type with a declared size of zero is suspicious but legal.
    if let Some(dt) = oid_def.get("data_type").and_then(Value::as_str) {
        if dt != "na"
            && dt != "arrayI"
            && dt != "arrayS"
            && oid_def.get("size").and_then(Value::as_i64) == Some(0)
        {
            warn!("{} of data type {} has 0 size", name, dt);
        }
    }

    if let Some(read) = oid_def.get("read") {
        check_read_def(name, read)?;
    }
    if let Some(write) = oid_def.get("write") {
        check_write_def(name, write)?;
    }
    Ok(())
}

/// Checks the `read` section of an oid definition.
fn check_read_def(name: &str, read: &Value) -> Result<(), DaliError> {
    let read = read
        .as_object()
        .ok_or_else(|| DaliError::schema(name, "read definition must be a mapping"))?;

    let data_type = read
        .get("data_type")
        .ok_or_else(|| DaliError::schema(name, "missing data_type in read definition"))?;

    if read.contains_key("struct") && (read.contains_key("map") || read.contains_key("unit")) {
        // map and unit only make sense next to a scalar
        return Err(DaliError::schema(
            name,
            "map and/or unit definition at the same level as a struct",
        ));
    }

    if let Some(map) = read.get("map") {
        if !map.is_object() && !map.is_array() {
            return Err(DaliError::schema(
                name,
                format!("map items must be a mapping or sequence, found {}", kind_of(map)),
            ));
        }
    }

    if data_type.as_str() == Some(PACKED) {
        // A packed top level needs a struct to expand on the layout.
        let items = read.get("struct").ok_or_else(|| {
            DaliError::schema(
                name,
                "a data type of 'packed' needs a struct definition at the same level",
            )
        })?;
        validate_struct(name, items, ElementKind::Packed)?;
    } else if !data_type.is_null() {
        // A null data type means no response is expected.
        let text = data_type
            .as_str()
            .ok_or_else(|| DaliError::schema(name, "read data_type must be a string or null"))?;
        let spec = DataTypeSpec::parse(text).ok_or_else(|| {
            DaliError::schema(name, format!("invalid data type definition of {}", quote(text)))
        })?;

        if spec.is_array() && !spec.is_string() {
            if let Some(items) = read.get("struct") {
                validate_struct(name, items, ElementKind::from_code(spec.code))?;
            }
        }
    }
    Ok(())
}

/// Checks the `write` section of an oid definition.
fn check_write_def(name: &str, write: &Value) -> Result<(), DaliError> {
    let parms = write
        .get("parms")
        .ok_or_else(|| DaliError::schema(name, "write section needs a parms sequence"))?;
    let parms = parms
        .as_array()
        .ok_or_else(|| DaliError::schema(name, "write section parms element must be a sequence"))?;

    for item in parms {
        let item = item
            .as_object()
            .ok_or_else(|| DaliError::schema(name, "write section parms must contain records"))?;

        let write_type = item
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DaliError::schema(name, "write parm must contain a type element"))?;
        if !WRITE_TYPES.contains(&write_type) {
            return Err(DaliError::schema(
                name,
                format!("write parm type {} is invalid", quote(write_type)),
            ));
        }

        let field = item
            .get("field")
            .ok_or_else(|| DaliError::schema(name, "write parm must contain a 'field' element"))?;
        match field {
            // A descriptor list marks a bit-packed write.
            Value::Array(descriptors) => {
                for descriptor in descriptors {
                    if !descriptor.get("name").is_some_and(Value::is_string) {
                        return Err(DaliError::schema(
                            name,
                            "invalid or missing name element in write field descriptor",
                        ));
                    }
                    if !descriptor.get("size").is_some_and(is_integer) {
                        return Err(DaliError::schema(
                            name,
                            "invalid or missing size element in write field descriptor",
                        ));
                    }
                    if !descriptor.get("pos").is_some_and(is_integer) {
                        return Err(DaliError::schema(
                            name,
                            "invalid or missing pos element in write field descriptor",
                        ));
                    }
                }
            }
            Value::String(_) => {}
            other => {
                return Err(DaliError::schema(
                    name,
                    format!("write parm field must be a string or sequence, found {}", kind_of(other)),
                ));
            }
        }

        if let Some(validate) = item.get("validate") {
            check_validate_rules(name, validate)?;
        }
    }
    Ok(())
}

/// Checks the optional `validate` block of a write parm. The three
/// sub-rules are independent; each is checked only when present.
fn check_validate_rules(name: &str, validate: &Value) -> Result<(), DaliError> {
    if let Some(allowed) = validate.get("enum") {
        if !allowed.is_array() {
            return Err(DaliError::schema(name, "enum specs in a validate section must be a sequence"));
        }
    }

    if let Some(range) = validate.get("range") {
        let default = range.get("default").ok_or_else(|| {
            DaliError::schema(name, "validate range sections must have a key of 'default'")
        })?;
        for key in ["min", "max"] {
            if default.get(key).is_none() {
                return Err(DaliError::schema(
                    name,
                    format!("validate range sections must have a default key of {}", quote(key)),
                ));
            }
        }
    }

    if let Some(length) = validate.get("length") {
        for key in ["min", "max"] {
            if length.get(key).is_none() {
                return Err(DaliError::schema(
                    name,
                    format!("validate length sections must have a key of {}", quote(key)),
                ));
            }
        }
    }
    Ok(())
}

/// Validates a `struct` item list against the element kind of its
/// enclosing level, recursing wherever a nested struct refines an array
/// element type.
pub fn validate_struct(name: &str, items: &Value, kind: ElementKind) -> Result<(), DaliError> {
    let items = items
        .as_array()
        .ok_or_else(|| DaliError::schema(name, "struct definition must be a sequence"))?;

    for sitem in items {
        let sitem = sitem
            .as_object()
            .ok_or_else(|| DaliError::schema(name, "struct entries must be mappings"))?;

        if !sitem.contains_key("field") {
            return Err(DaliError::schema(name, "struct entry is missing a 'field' element"));
        }

        match kind {
            ElementKind::BitPack => match sitem.get("size") {
                Some(size) if is_integer(size) => {}
                Some(_) => {
                    return Err(DaliError::schema(name, "struct sizes must be integers"));
                }
                None => {
                    return Err(DaliError::schema(
                        name,
                        "struct entries for bit packed items must have a size",
                    ));
                }
            },
            ElementKind::Packed => {
                let text = sitem
                    .get("data_type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        DaliError::schema(
                            name,
                            "struct entries for the packed data type must carry a data_type",
                        )
                    })?;
                let spec = DataTypeSpec::parse(text).ok_or_else(|| {
                    DaliError::schema(
                        name,
                        format!("invalid data type definition of {}", quote(text)),
                    )
                })?;

                if spec.is_array() {
                    if let Some(nested) = sitem.get("struct") {
                        validate_struct(name, nested, ElementKind::from_code(spec.code))?;
                    }
                }
            }
            ElementKind::Scalar(_) => {}
        }

        if let Some(map) = sitem.get("map") {
            if !map.is_object() && !map.is_array() {
                return Err(DaliError::schema(
                    name,
                    format!("map items must be a mapping or sequence, found {}", kind_of(map)),
                ));
            }
            if sitem.contains_key("struct") {
                return Err(DaliError::schema(
                    name,
                    "can't have a map and a struct definition at the same level",
                ));
            }
        }
    }
    Ok(())
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn oid(extra: Value) -> Value {
        let mut def = json!({
            "name": "fan_speed",
            "oid": "1.2.3",
            "data_type": "I",
            "service": "env",
            "description": "fan speed in rpm",
            "op": "get",
            "source": "cm",
            "request": "0x10",
            "size": 4,
        });
        for (k, v) in extra.as_object().unwrap() {
            def[k.as_str()] = v.clone();
        }
        def
    }

    fn doc(defs: Vec<Value>) -> Value {
        json!({ "oids": defs })
    }

    fn schema_err(result: Result<(), DaliError>) -> (String, String) {
        match result.unwrap_err() {
            DaliError::Schema { oid, msg } => (oid, msg),
            other => panic!("expected a schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_minimal_definition() {
        validate_document(&doc(vec![oid(json!({}))])).unwrap();
    }

    #[test]
    fn test_missing_oids_attribute() {
        let (_, msg) = schema_err(validate_document(&json!({})));
        assert!(msg.contains("oids"));
    }

    #[test]
    fn test_missing_required_attribute_names_oid_and_attribute() {
        for attr in REQUIRED_ATTRS {
            let mut def = oid(json!({}));
            def.as_object_mut().unwrap().remove(attr);
            let (name, msg) = schema_err(validate_document(&doc(vec![def])));
            assert_eq!(name, "fan_speed");
            assert!(msg.contains(attr), "message {:?} should name {:?}", msg, attr);
        }
    }

    #[test]
    fn test_rejects_bad_oid_name() {
        let (name, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "name": "fan-speed"
        }))])));
        assert_eq!(name, "fan-speed");
        assert!(msg.contains("invalid characters"));
    }

    #[test]
    fn test_read_requires_data_type_key() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "read": {}
        }))])));
        assert!(msg.contains("data_type"));
    }

    #[test]
    fn test_read_null_data_type_means_no_response() {
        validate_document(&doc(vec![oid(json!({
            "read": { "data_type": null }
        }))]))
        .unwrap();
    }

    #[test]
    fn test_read_packed_requires_struct() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "read": { "data_type": "packed" }
        }))])));
        assert!(msg.contains("struct"));
    }

    #[test]
    fn test_read_packed_with_struct() {
        validate_document(&doc(vec![oid(json!({
            "read": {
                "data_type": "packed",
                "struct": [
                    { "field": "status", "data_type": "I" },
                    { "field": "label", "data_type": "16xC" },
                ]
            }
        }))]))
        .unwrap();
    }

    #[test]
    fn test_read_struct_with_map_at_same_level() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "read": {
                "data_type": "packed",
                "struct": [{ "field": "a", "data_type": "I" }],
                "map": { "0": "off" }
            }
        }))])));
        assert!(msg.contains("map"));
    }

    #[test]
    fn test_read_invalid_data_type() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "read": { "data_type": "4xZ" }
        }))])));
        assert!(msg.contains("invalid data type"));
    }

    #[test]
    fn test_read_array_of_bitpack_validates_nested_sizes() {
        // 4xb with a struct: every entry needs an integer size
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "read": {
                "data_type": "4xb",
                "struct": [{ "field": "enabled" }]
            }
        }))])));
        assert!(msg.contains("size"));
    }

    #[test]
    fn test_read_array_of_string_skips_struct_validation() {
        // an Nx C array is a plain string list, the struct is not descended
        validate_document(&doc(vec![oid(json!({
            "read": { "data_type": "4xC", "struct": "not even a sequence" }
        }))]))
        .unwrap();
    }

    #[test]
    fn test_struct_map_and_struct_are_exclusive_at_any_depth() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "read": {
                "data_type": "packed",
                "struct": [{
                    "field": "modes",
                    "data_type": "4xb",
                    "struct": [{
                        "field": "flag",
                        "size": 1,
                        "map": { "0": "off", "1": "on" },
                        "struct": []
                    }]
                }]
            }
        }))])));
        assert!(msg.contains("same level"));
    }

    #[test]
    fn test_write_requires_parms() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "write": {}
        }))])));
        assert!(msg.contains("parms"));
    }

    #[test]
    fn test_write_rejects_unknown_type() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "write": { "parms": [{ "type": "w8", "field": "value" }] }
        }))])));
        assert!(msg.contains("w8"));
    }

    #[test]
    fn test_write_scalar_field() {
        validate_document(&doc(vec![oid(json!({
            "write": { "parms": [{ "type": "w2", "field": "value" }] }
        }))]))
        .unwrap();
    }

    #[test]
    fn test_write_bitpack_field_descriptors() {
        validate_document(&doc(vec![oid(json!({
            "write": {
                "parms": [{
                    "type": "w1",
                    "field": [
                        { "name": "enable", "size": 1, "pos": 0 },
                        { "name": "mode", "size": 3, "pos": 1 },
                    ]
                }]
            }
        }))]))
        .unwrap();
    }

    #[test]
    fn test_write_bitpack_descriptor_missing_pos() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "write": {
                "parms": [{
                    "type": "w1",
                    "field": [{ "name": "enable", "size": 1 }]
                }]
            }
        }))])));
        assert!(msg.contains("pos"));
    }

    #[test]
    fn test_write_bitpack_descriptor_with_string_size() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "write": {
                "parms": [{
                    "type": "w1",
                    "field": [{ "name": "enable", "size": "1", "pos": 0 }]
                }]
            }
        }))])));
        assert!(msg.contains("size"));
    }

    #[test]
    fn test_write_validate_enum_must_be_sequence() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "write": {
                "parms": [{
                    "type": "C",
                    "field": "mode",
                    "validate": { "enum": "auto" }
                }]
            }
        }))])));
        assert!(msg.contains("enum"));
    }

    #[test]
    fn test_write_validate_range_needs_default_min_max() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "write": {
                "parms": [{
                    "type": "w4",
                    "field": "value",
                    "validate": { "range": { "default": { "min": 0 } } }
                }]
            }
        }))])));
        assert!(msg.contains("max"));
    }

    #[test]
    fn test_write_validate_length_needs_min_max() {
        let (_, msg) = schema_err(validate_document(&doc(vec![oid(json!({
            "write": {
                "parms": [{
                    "type": "C",
                    "field": "label",
                    "validate": { "length": { "max": 16 } }
                }]
            }
        }))])));
        assert!(msg.contains("min"));
    }

    #[test]
    fn test_write_validate_all_rules_together() {
        validate_document(&doc(vec![oid(json!({
            "write": {
                "parms": [{
                    "type": "C",
                    "field": "label",
                    "validate": {
                        "enum": ["a", "b"],
                        "range": { "default": { "min": 0, "max": 10 } },
                        "length": { "min": 1, "max": 16 }
                    }
                }]
            }
        }))]))
        .unwrap();
    }

    #[test]
    fn test_duplicate_names_are_permitted() {
        validate_document(&doc(vec![oid(json!({})), oid(json!({}))])).unwrap();
    }
}

use apollo_compiler::ast::Value as GraphQLValue;
use serde_json::Number;
use serde_json::Value;

/// Converts a constant GraphQL value (a directive argument) to JSON.
pub(crate) fn to_json(value: &GraphQLValue) -> Result<Value, String> {
    Ok(match value {
        GraphQLValue::Null => Value::Null,
        GraphQLValue::Enum(name) => Value::String(name.to_string()),
        GraphQLValue::Variable(name) => {
            return Err(format!("variable `${name}` can't be used in a directive argument"));
        }
        GraphQLValue::String(string) => Value::String(string.clone()),
        GraphQLValue::Boolean(boolean) => Value::Bool(*boolean),
        GraphQLValue::Int(int) => int
            .as_str()
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| float(int.as_str()))?,
        GraphQLValue::Float(float_value) => float(float_value.as_str())?,
        GraphQLValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| to_json(item))
                .collect::<Result<_, _>>()?,
        ),
        GraphQLValue::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| Ok((name.to_string(), to_json(value)?)))
                .collect::<Result<_, String>>()?,
        ),
    })
}

fn float(raw: &str) -> Result<Value, String> {
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("`{raw}` is not a valid number"))
}

/// The JSON type name of a value, as reported in errors.
pub(crate) fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ast::Value as GraphQLValue;
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn converts_constant_values() {
        let value = GraphQLValue::Object(vec![
            (name!("name"), GraphQLValue::String("x".into()).into()),
            (name!("count"), GraphQLValue::Int(3.into()).into()),
            (name!("ratio"), GraphQLValue::Float(1.5.into()).into()),
            (name!("kind"), GraphQLValue::Enum(name!("COMPONENT")).into()),
            (
                name!("tags"),
                GraphQLValue::List(vec![GraphQLValue::Boolean(true).into(), GraphQLValue::Null.into()])
                    .into(),
            ),
        ]);
        assert_eq!(
            to_json(&value).unwrap(),
            json!({ "name": "x", "count": 3, "ratio": 1.5, "kind": "COMPONENT", "tags": [true, null] })
        );
    }

    #[test]
    fn rejects_variables() {
        assert!(to_json(&GraphQLValue::Variable(name!("x"))).is_err());
    }
}

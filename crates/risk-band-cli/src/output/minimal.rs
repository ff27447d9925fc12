use serde_json::Value;

/// Print just the headline number from the output.
///
/// Heuristic: look for well-known result fields in order of priority —
/// checking the association section of the report shape as well — then
/// fall back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    // Try to extract the "result" envelope
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Priority list of headline output fields
    let priority_keys = [
        "p_value",
        "chi_square",
        "total_iv",
        "mcfadden_r2",
        "overall_default_rate",
    ];

    // The report nests the headline numbers in its association section.
    let candidates = [result_obj.get("association").unwrap_or(result_obj), result_obj];

    for obj in &candidates {
        if let Value::Object(map) = obj {
            for key in &priority_keys {
                if let Some(val) = map.get(*key) {
                    if !val.is_null() {
                        println!("{}", format_minimal(val));
                        return;
                    }
                }
            }
        }
    }

    if let Value::Object(map) = result_obj {
        // Fall back to first field
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    // Not an object, just print directly
    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

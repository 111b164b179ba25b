use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Print a success message in the selected format. Object-valued `data` is
/// merged into the JSON envelope; anything else lands under `data`.
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&envelope(message, data))?),
        OutputFormat::Text => println!("✓ {}", message),
    }
    Ok(())
}

fn envelope(message: &str, data: Option<Value>) -> Value {
    let mut response = json!({
        "success": true,
        "message": message
    });
    match data {
        Some(Value::Object(fields)) => {
            if let Value::Object(target) = &mut response {
                target.extend(fields);
            }
        }
        Some(other) => response["data"] = other,
        None => {}
    }
    response
}

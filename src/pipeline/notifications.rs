// Run report texts sent through the notifier

use serde_json::json;

pub fn success_message(datestamp: &str, db_name: &str, table: &str, rows: usize) -> String {
    let report = json!({
        "status": "SUCCESS",
        "message": format!("Successfully updated {table} in {db_name} ({rows} rows)!"),
    });
    format!("\"{datestamp}\": `{report}`")
}

/// The error text is flattened onto one line
pub fn failure_message(datestamp: &str, db_name: &str, table: &str, error: &str) -> String {
    let report = json!({
        "status": "FAIL",
        "message": format!("Failed to update {table} in {db_name}!"),
        "error": error.replace('\n', " "),
    });
    format!("\"{datestamp}\": `{report}`")
}

pub fn new_log_file_message(datestamp: &str, log_name: &str, folder_id: &str, file_id: &str) -> String {
    format!(
        "\"{datestamp}\": `Uploaded {log_name} to Box folder {folder_id} with new file ID: {file_id}! \
         Remember to update the config file!`"
    )
}

//! Human vs. JSON rendering for CLI command results.

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

pub fn emit<T: serde::Serialize>(format: OutputFormat, value: &T, human: impl FnOnce() -> String) {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(value).expect("value is always serializable");
            println!("{text}");
        }
        OutputFormat::Human => println!("{}", human()),
    }
}

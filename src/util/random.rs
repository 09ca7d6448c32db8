use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub fn generate_30_alphanumeric() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(30).map(char::from).collect()
}

/// `<millis>-<token>-<name>`, unique per call.
pub fn unique_file_name(original_name: &str) -> String {
    let token: String = thread_rng().sample_iter(&Alphanumeric).take(10).map(char::from).collect();
    format!("{}-{}-{}", Utc::now().timestamp_millis(), token.to_lowercase(), original_name)
}

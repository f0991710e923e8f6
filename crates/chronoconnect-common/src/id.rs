/// Fresh random v4 UUID rendered as a string.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Replaces spaces with `%20`. Nothing else is escaped.
pub fn encode_query(query: &str) -> String {
    query.replace(' ', "%20")
}

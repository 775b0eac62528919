//! Insertion-ordered header map and emission-order helpers.
//!
//! Header order is part of the browser fingerprint, so headers are kept as
//! an ordered list rather than a hash map. Lookup is case-insensitive;
//! insertion replaces in place to preserve the original position.

/// Insertion-ordered header collection.
#[derive(Debug, Clone, Default)]
pub struct OrderedHeaders {
    entries: Vec<(String, String)>,
}

impl OrderedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set a header, replacing an existing one in place (position kept).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Set a header only when it is not already present.
    pub fn set_default(&mut self, name: &str, value: impl Into<String>) {
        if self.get(name).is_none() {
            self.entries.push((name.to_string(), value.into()));
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove a header by name.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Consume into the underlying list.
    pub fn into_vec(self) -> Vec<(String, String)> {
        self.entries
    }
}

impl FromIterator<(String, String)> for OrderedHeaders {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

impl<'a> IntoIterator for &'a OrderedHeaders {
    type Item = &'a (String, String);
    type IntoIter = std::slice::Iter<'a, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Sort headers for emission: names listed in `order` (lowercased) come
/// first, in that order; everything else follows in insertion order.
pub fn apply_header_order(
    headers: &OrderedHeaders,
    order: Option<&[String]>,
) -> Vec<(String, String)> {
    let Some(order) = order else {
        return headers
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
    };

    let mut ordered = Vec::with_capacity(headers.len());
    let mut remaining: Vec<(String, String)> = headers
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();

    for wanted in order {
        if let Some(pos) = remaining
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(wanted))
        {
            ordered.push(remaining.remove(pos));
        }
    }
    ordered.extend(remaining);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut headers = OrderedHeaders::new();
        headers.set("Accept", "*/*");
        headers.set("User-Agent", "x");
        headers.set("accept", "text/html");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected[0], ("Accept", "text/html"));
        assert_eq!(collected[1], ("User-Agent", "x"));
    }

    #[test]
    fn set_default_keeps_existing() {
        let mut headers = OrderedHeaders::new();
        headers.set("Accept", "text/html");
        headers.set_default("Accept", "*/*");
        assert_eq!(headers.get("accept"), Some("text/html"));
    }

    #[test]
    fn emission_order_puts_listed_names_first() {
        let mut headers = OrderedHeaders::new();
        headers.set("Accept", "*/*");
        headers.set("User-Agent", "ua");
        headers.set("Cookie", "a=b");

        let order = vec!["user-agent".to_string(), "cookie".to_string()];
        let emitted = apply_header_order(&headers, Some(&order));
        assert_eq!(emitted[0].0, "User-Agent");
        assert_eq!(emitted[1].0, "Cookie");
        assert_eq!(emitted[2].0, "Accept");
    }
}

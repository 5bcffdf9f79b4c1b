//! Submitted form fields.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

/// Ordered multimap of form values.
///
/// Array inputs such as `bankEmail[]` arrive as repeated names and keep their
/// submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    entries: Vec<(String, String)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Parses an `application/x-www-form-urlencoded` body.
    ///
    /// # Examples
    ///
    /// ```
    /// use audit_reports::core::form::FormFields;
    ///
    /// let form = FormFields::from_urlencoded("city=Pune&bankEmail%5B%5D=a%40b.in&bankEmail%5B%5D=c%40d.in");
    /// assert_eq!(form.get("city"), "Pune");
    /// assert_eq!(form.get_all("bankEmail[]"), vec!["a@b.in", "c@d.in"]);
    /// ```
    #[must_use]
    pub fn from_urlencoded(body: &str) -> Self {
        let decode = |s: &str| {
            let spaced = s.replace('+', " ");
            percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
        };
        let entries = body
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (decode(k), decode(v)),
                None => (decode(pair), String::new()),
            })
            .collect();
        Self { entries }
    }

    /// First value of `name`, trimmed; empty when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> &str {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map_or("", |(_, v)| v.trim())
    }

    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Value of a select that offers an `other` choice backed by a free-text
    /// field.
    #[must_use]
    pub fn choice_or_other(&self, name: &str, other: &str) -> String {
        let value = self.get(name);
        if value.eq_ignore_ascii_case("other") {
            self.get(other).to_string()
        } else {
            value.to_string()
        }
    }

    /// Last value per name, as used for checklist answers.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

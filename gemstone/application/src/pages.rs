//! Server-rendered HTML for the home page and the prediction form.

use std::collections::HashMap;

use gemstone_learning::schema::{CategoricalColumn, NumericColumn};

/// What to show under the form.
pub enum Outcome<'a> {
    /// Nothing submitted yet.
    Empty,
    /// Rounded prediction.
    Price(f64),
    /// Failure message shown to the user.
    Error(&'a str),
}

/// Landing page linking to the form.
pub fn home() -> String {
    layout(
        "Gemstone Price Prediction",
        "<h1>Gemstone Price Prediction</h1>\n<p><a href=\"/predict\">Estimate a price</a></p>",
    )
}

/// The form, pre-filled with `values`, followed by `outcome`.
pub fn form(values: &HashMap<String, String>, outcome: &Outcome<'_>) -> String {
    let mut body = String::from(
        "<h1>Gemstone Price Prediction</h1>\n<form method=\"post\" action=\"/predict\">\n",
    );
    for column in NumericColumn::ALL {
        let name = column.name();
        let value = escape(values.get(name).map_or("", String::as_str));
        body.push_str(&format!(
            "<label>{name} <input type=\"text\" name=\"{name}\" value=\"{value}\" required></label><br>\n"
        ));
    }
    for column in CategoricalColumn::ALL {
        body.push_str(&select(column, values.get(column.name()).map(String::as_str)));
    }
    body.push_str("<button type=\"submit\">Predict</button>\n</form>\n");
    match outcome {
        Outcome::Empty => {}
        Outcome::Price(price) => {
            body.push_str(&format!("<h2 class=\"result\">Predicted price: {price:.2}</h2>\n"));
        }
        Outcome::Error(message) => {
            body.push_str(&format!(
                "<p class=\"error\">Prediction failed: {}</p>\n",
                escape(message)
            ));
        }
    }
    layout("Predict", &body)
}

fn select(column: CategoricalColumn, selected: Option<&str>) -> String {
    let name = column.name();
    let placeholder = if selected.is_none() { " selected" } else { "" };
    let options: String = column
        .vocabulary()
        .iter()
        .map(|grade| {
            let mark = if selected == Some(*grade) { " selected" } else { "" };
            let grade = escape(grade);
            format!("<option value=\"{grade}\"{mark}>{grade}</option>\n")
        })
        .collect();
    format!(
        "<label>{name} <select name=\"{name}\" required>\n\
         <option value=\"\" disabled{placeholder}>Select {name}</option>\n\
         {options}</select></label><br>\n"
    )
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{body}\n</body>\n</html>\n",
        escape(title)
    )
}

/// Escapes text for HTML bodies and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b a=\"1\">&'"), "&lt;b a=&quot;1&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn form_keeps_submitted_values() {
        let values: HashMap<String, String> = [
            ("carat".to_string(), "0.3\"><script>".to_string()),
            ("cut".to_string(), "Ideal".to_string()),
        ]
        .into_iter()
        .collect();
        let html = form(&values, &Outcome::Empty);
        assert!(html.contains("value=\"0.3&quot;&gt;&lt;script&gt;\""));
        assert!(html.contains("<option value=\"Ideal\" selected>Ideal</option>"));
        assert!(html.contains("<option value=\"Very Good\">Very Good</option>"));
        assert!(!html.contains("Predicted price"));
    }

    #[test]
    fn outcome_is_rendered() {
        let empty = HashMap::new();
        assert!(form(&empty, &Outcome::Price(1234.567)).contains("Predicted price: 1234.57"));
        assert!(form(&empty, &Outcome::Error("bad <cut>")).contains("Prediction failed: bad &lt;cut&gt;"));
    }
}

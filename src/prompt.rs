//! SQL-generation prompt rendering.
//!
//! The template is parsed once into literal and placeholder segments, then
//! rendered in a single pass: question and schema text are inserted
//! verbatim and never re-scanned, so input that happens to contain
//! `{user_question}` stays literal.

use std::sync::OnceLock;

use serde::Deserialize;

/// The SQLCoder task prompt. Ends with an open SQL code fence for the model
/// to complete.
pub const PROMPT_TEMPLATE: &str = "### Task
Generate a SQL query to answer the following question:
`{user_question}`

### Database Schema
The query will run on a database with the following schema:
{table_metadata_string}

### SQL
Follow these steps to create the SQL Query:
1. Only use the columns and tables present in the database schema
2. Use table aliases to prevent ambiguity when doing joins. For example, `SELECT table1.col1, table2.col1 FROM table1 JOIN table2 ON table1.id = table2.id`.

Given the database schema, here is the SQL query that answers `{user_question}`:
```sql
";

/// Sample sales schema used when the caller supplies none.
pub const METADATA_DEFAULT: &str = "CREATE TABLE products (
  product_id INTEGER PRIMARY KEY, -- Unique ID for each product
  name VARCHAR(50), -- Name of the product
  price DECIMAL(10,2), -- Price of each unit of the product
  quantity INTEGER  -- Current quantity in stock
);

CREATE TABLE customers (
   customer_id INTEGER PRIMARY KEY, -- Unique ID for each customer
   name VARCHAR(50), -- Name of the customer
   address VARCHAR(100) -- Mailing address of the customer
);

CREATE TABLE salespeople (
  salesperson_id INTEGER PRIMARY KEY, -- Unique ID for each salesperson 
  name VARCHAR(50), -- Name of the salesperson
  region VARCHAR(50) -- Geographic sales region 
);

CREATE TABLE sales (
  sale_id INTEGER PRIMARY KEY, -- Unique ID for each sale
  product_id INTEGER, -- ID of product sold
  customer_id INTEGER,  -- ID of customer who made purchase
  salesperson_id INTEGER, -- ID of salesperson who made the sale
  sale_date DATE, -- Date the sale occurred 
  quantity INTEGER -- Quantity of product sold
);

CREATE TABLE product_suppliers (
  supplier_id INTEGER PRIMARY KEY, -- Unique ID for each supplier
  product_id INTEGER, -- Product ID supplied
  supply_price DECIMAL(10,2) -- Unit price charged by supplier
);

-- sales.product_id can be joined with products.product_id
-- sales.customer_id can be joined with customers.customer_id 
-- sales.salesperson_id can be joined with salespeople.salesperson_id
-- product_suppliers.product_id can be joined with products.product_id
";

// ─── PromptRequest ───────────────────────────────────────────────────────────

/// A question plus the schema it should be answered against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptRequest {
    pub question: String,
    #[serde(default = "default_schema_metadata", alias = "metadata")]
    pub schema_metadata: String,
}

fn default_schema_metadata() -> String {
    METADATA_DEFAULT.to_string()
}

impl PromptRequest {
    pub fn new(question: impl Into<String>, schema_metadata: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            schema_metadata: schema_metadata.into(),
        }
    }

    /// A request against [`METADATA_DEFAULT`].
    pub fn with_default_schema(question: impl Into<String>) -> Self {
        Self::new(question, METADATA_DEFAULT)
    }

    /// Render with the built-in template.
    pub fn render(&self) -> String {
        render_prompt(&self.question, &self.schema_metadata)
    }
}

// ─── Template ────────────────────────────────────────────────────────────────

/// Substitution points in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Question,
    Metadata,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "user_question" => Some(Field::Question),
            "table_metadata_string" => Some(Field::Metadata),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Field),
}

/// A template split into literal text and placeholders.
///
/// Braces that do not enclose a known field name are kept as literal text.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let field = after
                .find('}')
                .and_then(|close| Field::from_name(&after[..close]).map(|f| (f, close)));

            match field {
                Some((field, close)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(field));
                    rest = &after[close + 1..];
                }
                None => {
                    literal.push('{');
                    rest = after;
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Substitute both inputs in one pass.
    pub fn render(&self, question: &str, metadata: &str) -> String {
        let capacity = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.len(),
                Segment::Placeholder(Field::Question) => question.len(),
                Segment::Placeholder(Field::Metadata) => metadata.len(),
            })
            .sum();

        let mut out = String::with_capacity(capacity);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(Field::Question) => out.push_str(question),
                Segment::Placeholder(Field::Metadata) => out.push_str(metadata),
            }
        }
        out
    }

    /// Number of question substitution points.
    pub fn question_slots(&self) -> usize {
        self.count(Field::Question)
    }

    /// Number of schema substitution points.
    pub fn metadata_slots(&self) -> usize {
        self.count(Field::Metadata)
    }

    fn count(&self, field: Field) -> usize {
        self.segments
            .iter()
            .filter(|s| **s == Segment::Placeholder(field))
            .count()
    }
}

fn default_template() -> &'static PromptTemplate {
    static TEMPLATE: OnceLock<PromptTemplate> = OnceLock::new();
    TEMPLATE.get_or_init(|| PromptTemplate::parse(PROMPT_TEMPLATE))
}

/// Render the SQLCoder prompt for `question` against `schema_metadata`.
pub fn render_prompt(question: &str, schema_metadata: &str) -> String {
    tracing::debug!(question = %question, "rendering prompt");
    let prompt = default_template().render(question, schema_metadata);
    tracing::trace!(prompt = %prompt, "rendered prompt");
    prompt
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salespeople_scenario() {
        let question = "How many salespeople are there?";
        let prompt = render_prompt(question, METADATA_DEFAULT);

        assert!(prompt.starts_with("### Task\nGenerate a SQL query"));
        assert!(prompt.contains("`How many salespeople are there?`"));
        assert!(prompt.contains(METADATA_DEFAULT));
        assert!(prompt.ends_with("```sql\n"));
    }

    #[test]
    fn test_default_schema_keeps_trailing_whitespace() {
        assert_eq!(METADATA_DEFAULT.len(), 1462);
        let padded: Vec<&str> = METADATA_DEFAULT
            .lines()
            .filter(|line| line.ends_with(' '))
            .collect();
        assert_eq!(
            padded,
            vec![
                "  salesperson_id INTEGER PRIMARY KEY, -- Unique ID for each salesperson ",
                "  region VARCHAR(50) -- Geographic sales region ",
                "  sale_date DATE, -- Date the sale occurred ",
                "-- sales.customer_id can be joined with customers.customer_id ",
            ]
        );
    }

    #[test]
    fn test_matches_plain_substitution() {
        let question = "Total revenue per city?";
        let metadata = "CREATE TABLE t (id INTEGER);";
        let expected = PROMPT_TEMPLATE
            .replace("{user_question}", question)
            .replace("{table_metadata_string}", metadata);
        assert_eq!(render_prompt(question, metadata), expected);
    }

    #[test]
    fn test_each_slot_filled_exactly_once() {
        let template = PromptTemplate::parse(PROMPT_TEMPLATE);
        assert_eq!(template.question_slots(), 2);
        assert_eq!(template.metadata_slots(), 1);

        let question = "Q-7f3a";
        let metadata = "M-91bc";
        let prompt = template.render(question, metadata);
        assert_eq!(prompt.matches(question).count(), template.question_slots());
        assert_eq!(prompt.matches(metadata).count(), template.metadata_slots());
        assert!(!prompt.contains("{user_question}"));
        assert!(!prompt.contains("{table_metadata_string}"));
    }

    #[test]
    fn test_placeholder_text_in_input_is_not_resubstituted() {
        let question = "what is {table_metadata_string}?";
        let prompt = render_prompt(question, "SCHEMA");
        assert_eq!(prompt.matches("what is {table_metadata_string}?").count(), 2);
        assert_eq!(prompt.matches("SCHEMA").count(), 1);
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = render_prompt("q", "m");
        let b = render_prompt("q", "m");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_braces_stay_literal() {
        let template = PromptTemplate::parse("{a} {user_question} {");
        assert_eq!(template.render("Q", "M"), "{a} Q {");
    }

    #[test]
    fn test_prompt_request_default_schema_from_json() {
        let req: PromptRequest =
            serde_json::from_str(r#"{"question": "How many products?"}"#).unwrap();
        assert_eq!(req.schema_metadata, METADATA_DEFAULT);
        assert_eq!(req.render(), render_prompt("How many products?", METADATA_DEFAULT));
    }

    #[test]
    fn test_prompt_request_metadata_alias() {
        let req: PromptRequest =
            serde_json::from_str(r#"{"question": "q", "metadata": "CREATE TABLE x ();"}"#)
                .unwrap();
        assert_eq!(req, PromptRequest::new("q", "CREATE TABLE x ();"));
    }
}

//! Just enough GraphQL to serve the account summary.
//!
//! Documents hold a single operation made of field selections (aliases
//! allowed). Arguments, variables, fragments and directives are not part of
//! the schema and are rejected while parsing.
//!
//! ```graphql
//! type Query { me: User!  account: Account! }
//! type User { id: ID!  name: String! }
//! type Account { id: ID!  balance: Float! }
//! ```
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::accounts::{AccountsApi, AccountsError};

/// Deepest selection set a document may nest. The schema itself needs two.
pub const MAX_SELECTION_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorMessage>,
}

/// Errors that prevent a document from executing at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphQLError {
    #[error("Syntax Error: {0}")]
    Syntax(String),
    #[error("{}", .0.join("\n"))]
    Validation(Vec<String>),
}

impl GraphQLError {
    pub fn messages(&self) -> Vec<String> {
        match self {
            GraphQLError::Syntax(_) => vec![self.to_string()],
            GraphQLError::Validation(messages) => messages.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub selection: Vec<Field>,
}

impl Field {
    /// Key of the field in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub selection: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    BraceOpen,
    BraceClose,
    Colon,
    Other(char),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Name(name) => format!("Name \"{name}\""),
            Token::BraceOpen => "\"{\"".to_owned(),
            Token::BraceClose => "\"}\"".to_owned(),
            Token::Colon => "\":\"".to_owned(),
            Token::Other(c) => format!("\"{c}\""),
        }
    }
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            // Commas are insignificant, like whitespace.
            c if c.is_whitespace() || c == ',' || c == '\u{feff}' => {}
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                }
            }
            '{' => tokens.push(Token::BraceOpen),
            '}' => tokens.push(Token::BraceClose),
            ':' => tokens.push(Token::Colon),
            c if c == '_' || c.is_ascii_alphabetic() => {
                let mut name = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next == '_' || next.is_ascii_alphanumeric() {
                        name.push(next);
                        _ = chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => tokens.push(Token::Other(other)),
        }
    }
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn unexpected(found: Option<&Token>, expected: &str) -> GraphQLError {
        let found = found.map_or_else(|| "<EOF>".to_owned(), Token::describe);
        GraphQLError::Syntax(format!("Expected {expected}, found {found}."))
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), GraphQLError> {
        match self.next() {
            Some(found) if found == token => Ok(()),
            found => Err(Self::unexpected(found.as_ref(), expected)),
        }
    }

    fn name(&mut self) -> Result<String, GraphQLError> {
        match self.next() {
            Some(Token::Name(name)) => Ok(name),
            found => Err(Self::unexpected(found.as_ref(), "Name")),
        }
    }

    fn document(&mut self) -> Result<Document, GraphQLError> {
        let (kind, name) = match self.peek() {
            Some(Token::BraceOpen) => (OperationKind::Query, None),
            Some(Token::Name(keyword)) => {
                let kind = match keyword.as_str() {
                    "query" => OperationKind::Query,
                    "mutation" => OperationKind::Mutation,
                    "subscription" => OperationKind::Subscription,
                    other => {
                        return Err(GraphQLError::Syntax(format!("Unexpected Name \"{other}\".")))
                    }
                };
                drop(self.next());
                let name = match self.peek() {
                    Some(Token::Name(_)) => Some(self.name()?),
                    _ => None,
                };
                (kind, name)
            }
            found => return Err(Self::unexpected(found, "\"{\"")),
        };

        let selection = self.selection_set()?;
        if let Some(extra) = self.peek() {
            return Err(GraphQLError::Syntax(format!(
                "Unexpected {}.",
                extra.describe()
            )));
        }
        Ok(Document {
            kind,
            name,
            selection,
        })
    }

    fn selection_set(&mut self) -> Result<Vec<Field>, GraphQLError> {
        self.expect(Token::BraceOpen, "\"{\"")?;
        if self.depth == MAX_SELECTION_DEPTH {
            return Err(GraphQLError::Syntax(format!(
                "Selections nest deeper than {MAX_SELECTION_DEPTH} levels."
            )));
        }
        self.depth += 1;
        let mut fields = vec![self.field()?];
        while !matches!(self.peek(), Some(Token::BraceClose)) {
            fields.push(self.field()?);
        }
        self.expect(Token::BraceClose, "\"}\"")?;
        self.depth -= 1;
        Ok(fields)
    }

    fn field(&mut self) -> Result<Field, GraphQLError> {
        let first = self.name()?;
        let (alias, name) = if matches!(self.peek(), Some(Token::Colon)) {
            drop(self.next());
            (Some(first), self.name()?)
        } else {
            (None, first)
        };
        let selection = match self.peek() {
            Some(Token::BraceOpen) => self.selection_set()?,
            Some(Token::Other(c)) => {
                return Err(GraphQLError::Syntax(format!("Unexpected \"{c}\".")))
            }
            _ => Vec::new(),
        };
        Ok(Field {
            alias,
            name,
            selection,
        })
    }
}

pub fn parse(query: &str) -> Result<Document, GraphQLError> {
    Parser {
        tokens: tokenize(query),
        position: 0,
        depth: 0,
    }
    .document()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Scalar(&'static str),
    Object(ObjectType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectType {
    Query,
    User,
    Account,
}

impl ObjectType {
    fn name(&self) -> &'static str {
        match self {
            ObjectType::Query => "Query",
            ObjectType::User => "User",
            ObjectType::Account => "Account",
        }
    }

    fn field(&self, name: &str) -> Option<FieldType> {
        if name == "__typename" {
            return Some(FieldType::Scalar("String!"));
        }
        match (self, name) {
            (ObjectType::Query, "me") => Some(FieldType::Object(ObjectType::User)),
            (ObjectType::Query, "account") => Some(FieldType::Object(ObjectType::Account)),
            (ObjectType::User, "id") | (ObjectType::Account, "id") => {
                Some(FieldType::Scalar("ID!"))
            }
            (ObjectType::User, "name") => Some(FieldType::Scalar("String!")),
            (ObjectType::Account, "balance") => Some(FieldType::Scalar("Float!")),
            _ => None,
        }
    }
}

fn validate_selection(parent: ObjectType, selection: &[Field], errors: &mut Vec<String>) {
    for field in selection {
        match parent.field(&field.name) {
            None => errors.push(format!(
                "Cannot query field \"{}\" on type \"{}\".",
                field.name,
                parent.name()
            )),
            Some(FieldType::Scalar(type_name)) if !field.selection.is_empty() => {
                errors.push(format!(
                    "Field \"{}\" must not have a selection since type \"{}\" has no subfields.",
                    field.name, type_name
                ))
            }
            Some(FieldType::Scalar(_)) => {}
            Some(FieldType::Object(object)) if field.selection.is_empty() => {
                errors.push(format!(
                    "Field \"{}\" of type \"{}!\" must have a selection of subfields. Did you mean \"{} {{ ... }}\"?",
                    field.name,
                    object.name(),
                    field.name
                ))
            }
            Some(FieldType::Object(object)) => validate_selection(object, &field.selection, errors),
        }
    }
}

pub fn validate(document: &Document) -> Result<(), GraphQLError> {
    if document.kind != OperationKind::Query {
        return Err(GraphQLError::Validation(vec![format!(
            "Schema is not configured to execute {} operation.",
            document.kind.as_str()
        )]));
    }

    let mut errors = Vec::new();
    validate_selection(ObjectType::Query, &document.selection, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GraphQLError::Validation(errors))
    }
}

/// Projects a resolved object onto a validated selection.
fn project(object: ObjectType, source: &Value, selection: &[Field]) -> Value {
    let mut out = Map::new();
    for field in selection {
        let value = if field.name == "__typename" {
            Value::String(object.name().to_owned())
        } else {
            source.get(&field.name).cloned().unwrap_or(Value::Null)
        };
        drop(out.insert(field.response_key().to_owned(), value));
    }
    Value::Object(out)
}

async fn resolve_root(
    field: &Field,
    accounts: &dyn AccountsApi,
) -> Result<Value, AccountsError> {
    let (object, source) = match field.name.as_str() {
        "me" => (ObjectType::User, serde_json::to_value(accounts.me().await?)),
        "account" => (
            ObjectType::Account,
            serde_json::to_value(accounts.account().await?),
        ),
        _ => return Ok(Value::String(ObjectType::Query.name().to_owned())),
    };
    let source = source.unwrap_or(Value::Null);
    Ok(project(object, &source, &field.selection))
}

/// Runs a validated query. Root fields are non-null, so a failing resolver
/// nulls out the whole `data` and reports an error at its path.
pub async fn execute(
    document: &Document,
    accounts: &dyn AccountsApi,
) -> GraphQLResponse {
    let mut data = Map::new();
    let mut errors = Vec::new();

    for field in &document.selection {
        match resolve_root(field, accounts).await {
            Ok(value) => {
                drop(data.insert(field.response_key().to_owned(), value));
            }
            Err(e) => {
                tracing::warn!(field = %field.name, "resolver failed: {}", e);
                errors.push(ErrorMessage {
                    message: e.to_string(),
                    path: Some(vec![field.response_key().to_owned()]),
                });
            }
        }
    }

    if errors.is_empty() {
        GraphQLResponse {
            data: Some(Value::Object(data)),
            errors,
        }
    } else {
        GraphQLResponse {
            data: Some(Value::Null),
            errors,
        }
    }
}

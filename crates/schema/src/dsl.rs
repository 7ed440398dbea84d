//! The schema DSL tokenizer and recursive-descent parser: `name = { field =
//! type, ... }`, comments `#`/`--` to end of line, primitive types
//! `integer`/`float`/`string`, nested struct literals, `(name)` references to
//! another schema, and `{ { T } }` arrays of `T` (a primitive, a schema
//! name, or a nested struct literal).

use ligature_errors::{constants::MAX_NOF_SCHEMAS, Error, ErrorCode, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Integer,
    Float,
    String,
    Struct(Vec<Field>),
    Ref(String),
    Array(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

/// One top-level `name = { ... }` definition, with its raw source span kept
/// around for error messages (`SchemaList_parse` in spec.md §4.E).
#[derive(Debug, Clone)]
pub struct SchemaSource {
    pub name: String,
    pub line: usize,
    pub fields: Vec<Field>,
}

struct Tokenizer<'s> {
    bytes: &'s [u8],
    pos: usize,
    line: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Eq,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl<'s> Tokenizer<'s> {
    fn new(src: &'s str) -> Self {
        Tokenizer { bytes: src.as_bytes(), pos: 0, line: 1 }
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                if self.bytes[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }
            if self.pos < self.bytes.len() && self.bytes[self.pos] == b'#' {
                self.skip_to_eol();
                continue;
            }
            if self.pos + 1 < self.bytes.len() && &self.bytes[self.pos..self.pos + 2] == b"--" {
                self.skip_to_eol();
                continue;
            }
            break;
        }
    }

    fn skip_to_eol(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn next(&mut self) -> Result<(Tok, usize)> {
        self.skip_trivia();
        let line = self.line;
        if self.pos >= self.bytes.len() {
            return Ok((Tok::Eof, line));
        }
        let c = self.bytes[self.pos];
        let tok = match c {
            b'=' => {
                self.pos += 1;
                Tok::Eq
            }
            b'{' => {
                self.pos += 1;
                Tok::LBrace
            }
            b'}' => {
                self.pos += 1;
                Tok::RBrace
            }
            b'(' => {
                self.pos += 1;
                Tok::LParen
            }
            b')' => {
                self.pos += 1;
                Tok::RParen
            }
            b',' => {
                self.pos += 1;
                Tok::Comma
            }
            _ if c.is_ascii_alphabetic() || c == b'_' => {
                let start = self.pos;
                while self.pos < self.bytes.len()
                    && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
                {
                    self.pos += 1;
                }
                let ident = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap().to_string();
                Tok::Ident(ident)
            }
            other => {
                return Err(Error::new(
                    ErrorCode::SyntaxError,
                    format!("unexpected character '{}' at line {line}", other as char),
                ))
            }
        };
        Ok((tok, line))
    }

    fn peek(&mut self) -> Result<(Tok, usize)> {
        let save = (self.pos, self.line);
        let tok = self.next()?;
        self.pos = save.0;
        self.line = save.1;
        Ok(tok)
    }
}

/// A running count of DSL nodes consumed while parsing one schema, capped
/// at `MaxNofNodes` (spec.md §4.E / §8).
const MAX_NOF_NODES: usize = 64;

struct Parser<'s> {
    tok: Tokenizer<'s>,
    node_count: usize,
}

impl<'s> Parser<'s> {
    fn bump_node(&mut self) -> Result<()> {
        self.node_count += 1;
        if self.node_count > MAX_NOF_NODES {
            return Err(Error::new(
                ErrorCode::ComplexityOfProblem,
                format!("schema exceeds the {MAX_NOF_NODES}-node limit"),
            ));
        }
        Ok(())
    }

    fn expect(&mut self, want: &Tok) -> Result<usize> {
        let (tok, line) = self.tok.next()?;
        if &tok != want {
            return Err(Error::new(
                ErrorCode::SyntaxError,
                format!("expected {want:?}, found {tok:?} at line {line}"),
            ));
        }
        Ok(line)
    }

    fn expect_ident(&mut self) -> Result<(String, usize)> {
        let (tok, line) = self.tok.next()?;
        match tok {
            Tok::Ident(s) => Ok((s, line)),
            other => Err(Error::new(
                ErrorCode::SyntaxError,
                format!("expected an identifier, found {other:?} at line {line}"),
            )),
        }
    }

    fn parse_struct_body(&mut self) -> Result<Vec<Field>> {
        self.expect(&Tok::LBrace)?;
        let mut fields = Vec::new();
        loop {
            if self.tok.peek()?.0 == Tok::RBrace {
                self.tok.next()?;
                break;
            }
            let (name, _) = self.expect_ident()?;
            self.expect(&Tok::Eq)?;
            self.bump_node()?;
            let ty = self.parse_field_type()?;
            fields.push(Field { name, ty });
            match self.tok.peek()?.0 {
                Tok::Comma => {
                    self.tok.next()?;
                }
                Tok::RBrace => {
                    self.tok.next()?;
                    break;
                }
                (tok, ..) => {
                    return Err(Error::new(
                        ErrorCode::SyntaxError,
                        format!("expected ',' or '}}', found {tok:?}"),
                    ))
                }
            }
        }
        Ok(fields)
    }

    fn parse_field_type(&mut self) -> Result<FieldType> {
        self.bump_node()?;
        match self.tok.peek()?.0 {
            Tok::Ident(name) => {
                self.tok.next()?;
                match name.as_str() {
                    "integer" => Ok(FieldType::Integer),
                    "float" => Ok(FieldType::Float),
                    "string" => Ok(FieldType::String),
                    other => Ok(FieldType::Ref(other.to_string())),
                }
            }
            Tok::LParen => {
                self.tok.next()?;
                let (name, _) = self.expect_ident()?;
                self.expect(&Tok::RParen)?;
                Ok(FieldType::Ref(name))
            }
            Tok::LBrace => {
                // Either `{ { T } }` (array of T) or `{ field = type, ... }`
                // (an inline struct literal).
                self.tok.next()?;
                if self.tok.peek()?.0 == Tok::LBrace {
                    self.tok.next()?;
                    let inner = self.parse_array_element_type()?;
                    self.expect(&Tok::RBrace)?;
                    self.expect(&Tok::RBrace)?;
                    Ok(FieldType::Array(Box::new(inner)))
                } else {
                    let mut fields = Vec::new();
                    loop {
                        if self.tok.peek()?.0 == Tok::RBrace {
                            self.tok.next()?;
                            break;
                        }
                        let (name, _) = self.expect_ident()?;
                        self.expect(&Tok::Eq)?;
                        self.bump_node()?;
                        let ty = self.parse_field_type()?;
                        fields.push(Field { name, ty });
                        match self.tok.peek()?.0 {
                            Tok::Comma => {
                                self.tok.next()?;
                            }
                            Tok::RBrace => {
                                self.tok.next()?;
                                break;
                            }
                            (tok, ..) => {
                                return Err(Error::new(
                                    ErrorCode::SyntaxError,
                                    format!("expected ',' or '}}', found {tok:?}"),
                                ))
                            }
                        }
                    }
                    Ok(FieldType::Struct(fields))
                }
            }
            (tok, ..) => Err(Error::new(
                ErrorCode::SyntaxError,
                format!("expected a type, found {tok:?}"),
            )),
        }
    }

    fn parse_array_element_type(&mut self) -> Result<FieldType> {
        match self.tok.peek()?.0 {
            Tok::Ident(name) => {
                self.tok.next()?;
                match name.as_str() {
                    "integer" => Ok(FieldType::Integer),
                    "float" => Ok(FieldType::Float),
                    "string" => Ok(FieldType::String),
                    other => Ok(FieldType::Ref(other.to_string())),
                }
            }
            Tok::LBrace => {
                self.tok.next()?;
                let mut fields = Vec::new();
                loop {
                    if self.tok.peek()?.0 == Tok::RBrace {
                        self.tok.next()?;
                        break;
                    }
                    let (name, _) = self.expect_ident()?;
                    self.expect(&Tok::Eq)?;
                    self.bump_node()?;
                    let ty = self.parse_field_type()?;
                    fields.push(Field { name, ty });
                    match self.tok.peek()?.0 {
                        Tok::Comma => {
                            self.tok.next()?;
                        }
                        Tok::RBrace => {
                            self.tok.next()?;
                            break;
                        }
                        (tok, ..) => {
                            return Err(Error::new(
                                ErrorCode::SyntaxError,
                                format!("expected ',' or '}}', found {tok:?}"),
                            ))
                        }
                    }
                }
                Ok(FieldType::Struct(fields))
            }
            (tok, ..) => Err(Error::new(
                ErrorCode::SyntaxError,
                format!("expected an array element type, found {tok:?}"),
            )),
        }
    }
}

/// Parse the full DSL source into per-schema chunks, enforcing the
/// `MAX_NOF_SCHEMAS` cap. Mirrors `SchemaList_parse` (spec.md §4.E). Each
/// schema gets its own node-count budget, since the cap is per schema.
pub fn parse_schema_list(src: &str) -> Result<Vec<SchemaSource>> {
    let mut out = Vec::new();
    let mut tok = Tokenizer::new(src);
    loop {
        if tok.peek()?.0 == Tok::Eof {
            break;
        }
        let mut p = Parser { tok, node_count: 0 };
        let (name, line) = p.expect_ident()?;
        p.expect(&Tok::Eq)?;
        let fields = p.parse_struct_body()?;
        tok = p.tok;
        out.push(SchemaSource { name, line, fields });
        if out.len() > MAX_NOF_SCHEMAS {
            return Err(Error::new(
                ErrorCode::ComplexityOfProblem,
                format!("more than {MAX_NOF_SCHEMAS} schemas defined in one source"),
            ));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_spec_example() {
        let src = r#"
            item_schema = {
              name = string,
              count = integer,
              price = float,
              tags = { { string } },      # array of strings
              owner = (user_schema)       # reference to another schema
            }
        "#;
        let schemas = parse_schema_list(src).unwrap();
        assert_eq!(schemas.len(), 1);
        let s = &schemas[0];
        assert_eq!(s.name, "item_schema");
        assert_eq!(s.fields.len(), 5);
        assert_eq!(s.fields[0].ty, FieldType::String);
        assert_eq!(s.fields[3].ty, FieldType::Array(Box::new(FieldType::String)));
        assert_eq!(s.fields[4].ty, FieldType::Ref("user_schema".to_string()));
    }

    #[test]
    fn supports_dash_dash_comments_and_nested_structs() {
        let src = r#"
            -- a schema with an inline nested struct
            outer = {
              inner = { a = integer, b = string }
            }
        "#;
        let schemas = parse_schema_list(src).unwrap();
        match &schemas[0].fields[0].ty {
            FieldType::Struct(fields) => assert_eq!(fields.len(), 2),
            other => panic!("expected a struct, got {other:?}"),
        }
    }

    #[test]
    fn rejects_schemas_past_the_node_cap() {
        let mut src = String::from("big = {\n");
        for i in 0..80 {
            src.push_str(&format!("f{i} = integer,\n"));
        }
        src.push('}');
        let err = parse_schema_list(&src).unwrap_err();
        assert_eq!(err.code, ErrorCode::ComplexityOfProblem);
    }
}

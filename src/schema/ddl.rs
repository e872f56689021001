//! DDL statement parser
//!
//! Understands the MySQL-dialect subset that affects table shape:
//! database create/drop/use, table create/drop/truncate/rename, column
//! add/modify/change/rename/drop and index create/drop. Comments and `SET`
//! statements parse to no changes. Anything else is rejected.

use super::change::{QualifiedName, SchemaChange};
use super::errors::{SchemaError, SchemaResult};
use super::types::{ColumnDef, IndexDef, TableDef};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word or number
    Word(String),
    /// Backtick-quoted identifier
    Quoted(String),
    /// String literal
    Literal(String),
    Symbol(char),
}

fn lex(sql: &str) -> SchemaResult<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c == '#' || (c == '-' && chars.get(i + 1) == Some(&'-')) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err(SchemaError::parse(sql, "unterminated comment"));
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
        } else if c == '`' {
            let (text, next) = read_quoted(sql, &chars, i, '`')?;
            tokens.push(Token::Quoted(text));
            i = next;
        } else if c == '\'' || c == '"' {
            let (text, next) = read_quoted(sql, &chars, i, c)?;
            tokens.push(Token::Literal(text));
            i = next;
        } else if is_word_char(c) {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Symbol(c));
            i += 1;
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Reads a quoted run starting at `start`; a doubled quote is an escaped quote.
fn read_quoted(sql: &str, chars: &[char], start: usize, quote: char) -> SchemaResult<(String, usize)> {
    let mut text = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None => return Err(SchemaError::parse(sql, format!("unterminated {} quote", quote))),
            Some('\\') if quote != '`' => {
                if let Some(escaped) = chars.get(i + 1) {
                    text.push(*escaped);
                }
                i += 2;
            }
            Some(c) if *c == quote => {
                if chars.get(i + 1) == Some(&quote) {
                    text.push(quote);
                    i += 2;
                } else {
                    return Ok((text, i + 1));
                }
            }
            Some(c) => {
                text.push(*c);
                i += 1;
            }
        }
    }
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(sql: &'a str) -> SchemaResult<Self> {
        let mut tokens = lex(sql)?;
        while tokens.last() == Some(&Token::Symbol(';')) {
            tokens.pop();
        }
        Ok(Self { sql, tokens, pos: 0 })
    }

    fn err(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::parse(self.sql, reason)
    }

    fn unsupported(&self) -> SchemaError {
        SchemaError::Unsupported(self.sql.trim().to_string())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn is_keyword_at(&self, offset: usize, keyword: &str) -> bool {
        matches!(self.peek_at(offset), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        self.is_keyword_at(0, keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_any_keyword(&mut self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.eat_keyword(k))
    }

    fn expect_keyword(&mut self, keyword: &str) -> SchemaResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.err(format!("expected {}", keyword)))
        }
    }

    fn is_symbol(&self, symbol: char) -> bool {
        self.peek() == Some(&Token::Symbol(symbol))
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.is_symbol(symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> SchemaResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.err(format!("expected '{}'", symbol)))
        }
    }

    fn expect_end(&self) -> SchemaResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.err("unexpected trailing tokens"))
        }
    }

    fn ident(&mut self) -> SchemaResult<String> {
        match self.peek().cloned() {
            Some(Token::Word(w)) | Some(Token::Quoted(w)) => {
                self.pos += 1;
                Ok(w.to_lowercase())
            }
            _ => Err(self.err("expected identifier")),
        }
    }

    fn qualified(&mut self) -> SchemaResult<QualifiedName> {
        let first = self.ident()?;
        if self.eat_symbol('.') {
            let second = self.ident()?;
            Ok(QualifiedName::new(Some(&first), &second))
        } else {
            Ok(QualifiedName::bare(&first))
        }
    }

    fn if_exists(&mut self) -> SchemaResult<()> {
        if self.eat_keyword("IF") {
            self.expect_keyword("EXISTS")?;
        }
        Ok(())
    }

    fn if_not_exists(&mut self) -> SchemaResult<()> {
        if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
        }
        Ok(())
    }

    /// Consumes tokens up to (not including) a `,` or `)` at nesting depth zero.
    fn skip_to_item_end(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Symbol('(') => depth += 1,
                Token::Symbol(')') if depth == 0 => return,
                Token::Symbol(')') => depth -= 1,
                Token::Symbol(',') if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// `(a, b(10) DESC, ...)`
    fn key_parts(&mut self) -> SchemaResult<Vec<String>> {
        self.expect_symbol('(')?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.ident()?);
            self.skip_to_item_end();
            if self.eat_symbol(',') {
                continue;
            }
            self.expect_symbol(')')?;
            return Ok(columns);
        }
    }

    /// `[name] [USING x] (key parts)`; an unnamed index takes its first column's name.
    fn index_body(&mut self, unique: bool) -> SchemaResult<IndexDef> {
        let name = if self.is_symbol('(') || self.is_keyword("USING") {
            None
        } else {
            Some(self.ident()?)
        };
        if self.eat_keyword("USING") {
            self.ident()?;
        }
        let columns = self.key_parts()?;
        let name = name.unwrap_or_else(|| columns[0].clone());
        self.skip_to_item_end();
        Ok(IndexDef::new(&name, &columns, unique))
    }

    /// `name type [attributes...]`; reports inline PRIMARY KEY / UNIQUE.
    fn column_def(&mut self) -> SchemaResult<(ColumnDef, bool, bool)> {
        let name = self.ident()?;
        let data_type = match self.peek().cloned() {
            Some(Token::Word(w)) => {
                self.pos += 1;
                w
            }
            _ => return Err(self.err(format!("expected type for column {}", name))),
        };

        let mut primary = false;
        let mut unique = false;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Symbol('(') => depth += 1,
                Token::Symbol(')') if depth == 0 => break,
                Token::Symbol(')') => depth -= 1,
                Token::Symbol(',') if depth == 0 => break,
                Token::Word(w) if depth == 0 && w.eq_ignore_ascii_case("PRIMARY") => {
                    primary = true
                }
                Token::Word(w) if depth == 0 && w.eq_ignore_ascii_case("UNIQUE") => unique = true,
                _ => {}
            }
            self.pos += 1;
        }

        Ok((ColumnDef::new(&name, &data_type), primary, unique))
    }

    fn parse(mut self) -> SchemaResult<Vec<SchemaChange>> {
        if self.at_end() {
            return Ok(Vec::new());
        }

        if self.eat_keyword("SET") {
            return Ok(Vec::new());
        }
        if self.eat_keyword("USE") {
            let name = self.ident()?;
            self.expect_end()?;
            return Ok(vec![SchemaChange::UseDatabase { name }]);
        }
        if self.eat_keyword("CREATE") {
            return self.create();
        }
        if self.eat_keyword("DROP") {
            return self.drop();
        }
        if self.eat_keyword("TRUNCATE") {
            self.eat_keyword("TABLE");
            let target = self.qualified()?;
            self.expect_end()?;
            return Ok(vec![SchemaChange::TruncateTable { target }]);
        }
        if self.eat_keyword("RENAME") {
            self.expect_keyword("TABLE")?;
            return self.rename_tables();
        }
        if self.eat_keyword("ALTER") {
            self.expect_keyword("TABLE")?;
            return self.alter_table();
        }

        Err(self.unsupported())
    }

    fn create(&mut self) -> SchemaResult<Vec<SchemaChange>> {
        if self.eat_keyword("OR") {
            self.expect_keyword("REPLACE")?;
        }

        if self.eat_any_keyword(&["DATABASE", "SCHEMA"]) {
            self.if_not_exists()?;
            let name = self.ident()?;
            return Ok(vec![SchemaChange::CreateDatabase { name }]);
        }

        if self.eat_keyword("TABLE") {
            self.if_not_exists()?;
            let target = self.qualified()?;
            if self.eat_keyword("LIKE") {
                let source = self.qualified()?;
                return Ok(vec![SchemaChange::CreateTableLike { target, source }]);
            }
            if self.is_keyword("AS") || self.is_keyword("SELECT") {
                return Err(self.unsupported());
            }
            let table = self.table_body(&target.name)?;
            return Ok(vec![SchemaChange::CreateTable { target, table }]);
        }

        let unique = self.eat_keyword("UNIQUE");
        if !unique {
            self.eat_any_keyword(&["FULLTEXT", "SPATIAL"]);
        }
        if self.eat_keyword("INDEX") {
            let name = self.ident()?;
            if self.eat_keyword("USING") {
                self.ident()?;
            }
            self.expect_keyword("ON")?;
            let target = self.qualified()?;
            let columns = self.key_parts()?;
            return Ok(vec![SchemaChange::CreateIndex {
                target,
                index: IndexDef::new(&name, &columns, unique),
            }]);
        }

        Err(self.unsupported())
    }

    fn table_body(&mut self, name: &str) -> SchemaResult<TableDef> {
        let mut table = TableDef::new(name);
        self.expect_symbol('(')?;

        loop {
            if self.eat_keyword("CONSTRAINT")
                && !(self.is_keyword("PRIMARY")
                    || self.is_keyword("UNIQUE")
                    || self.is_keyword("FOREIGN")
                    || self.is_keyword("CHECK"))
            {
                self.ident()?;
            }

            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                if self.eat_keyword("USING") {
                    self.ident()?;
                }
                table.primary_key = self.key_parts()?;
                self.skip_to_item_end();
            } else if self.eat_keyword("UNIQUE") {
                self.eat_any_keyword(&["KEY", "INDEX"]);
                let index = self.index_body(true)?;
                table.upsert_index(index);
            } else if self.eat_any_keyword(&["FULLTEXT", "SPATIAL"]) {
                self.eat_any_keyword(&["KEY", "INDEX"]);
                let index = self.index_body(false)?;
                table.upsert_index(index);
            } else if self.eat_any_keyword(&["KEY", "INDEX"]) {
                let index = self.index_body(false)?;
                table.upsert_index(index);
            } else if self.is_keyword("FOREIGN") || self.is_keyword("CHECK") {
                self.skip_to_item_end();
            } else {
                let (column, primary, unique) = self.column_def()?;
                if primary {
                    table.primary_key = vec![column.name.clone()];
                }
                if unique {
                    table.upsert_index(IndexDef::new(
                        &column.name,
                        &[column.name.clone()],
                        true,
                    ));
                }
                table.upsert_column(column);
            }

            if self.eat_symbol(',') {
                continue;
            }
            self.expect_symbol(')')?;
            break;
        }

        // Table options (ENGINE, CHARSET, ...) do not affect shape
        Ok(table)
    }

    fn drop(&mut self) -> SchemaResult<Vec<SchemaChange>> {
        if self.eat_any_keyword(&["DATABASE", "SCHEMA"]) {
            self.if_exists()?;
            let name = self.ident()?;
            self.expect_end()?;
            return Ok(vec![SchemaChange::DropDatabase { name }]);
        }

        if self.eat_any_keyword(&["TABLE", "TABLES"]) {
            self.if_exists()?;
            let mut changes = Vec::new();
            loop {
                let target = self.qualified()?;
                changes.push(SchemaChange::DropTable { target });
                if !self.eat_symbol(',') {
                    break;
                }
            }
            self.eat_any_keyword(&["RESTRICT", "CASCADE"]);
            self.expect_end()?;
            return Ok(changes);
        }

        if self.eat_keyword("INDEX") {
            let name = self.ident()?;
            self.expect_keyword("ON")?;
            let target = self.qualified()?;
            self.expect_end()?;
            return Ok(vec![SchemaChange::DropIndex { target, name }]);
        }

        Err(self.unsupported())
    }

    fn rename_tables(&mut self) -> SchemaResult<Vec<SchemaChange>> {
        let mut changes = Vec::new();
        loop {
            let from = self.qualified()?;
            self.expect_keyword("TO")?;
            let to = self.qualified()?;
            changes.push(SchemaChange::RenameTable { from, to });
            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_end()?;
        Ok(changes)
    }

    fn alter_table(&mut self) -> SchemaResult<Vec<SchemaChange>> {
        let target = self.qualified()?;
        if self.at_end() {
            return Err(self.err("ALTER TABLE without specification"));
        }

        let mut changes = Vec::new();
        loop {
            self.alter_spec(&target, &mut changes)?;
            self.skip_to_item_end();
            if self.eat_symbol(',') {
                continue;
            }
            self.expect_end()?;
            return Ok(changes);
        }
    }

    fn is_partition_spec(&self) -> bool {
        ["PARTITION", "PARTITIONS", "PARTITIONING"]
            .iter()
            .any(|kw| self.is_keyword_at(0, kw) || self.is_keyword_at(1, kw))
            || ["COALESCE", "REORGANIZE", "EXCHANGE", "REBUILD", "REPAIR", "ANALYZE"]
                .iter()
                .any(|kw| self.is_keyword_at(0, kw))
    }

    fn alter_spec(
        &mut self,
        target: &QualifiedName,
        changes: &mut Vec<SchemaChange>,
    ) -> SchemaResult<()> {
        // Partition maintenance leaves the column shape alone but is not modelled
        if self.is_partition_spec() {
            return Err(self.unsupported());
        }

        if self.eat_keyword("ADD") {
            if self.eat_keyword("CONSTRAINT")
                && !(self.is_keyword("PRIMARY")
                    || self.is_keyword("UNIQUE")
                    || self.is_keyword("FOREIGN"))
            {
                self.ident()?;
            }

            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                let columns = self.key_parts()?;
                changes.push(SchemaChange::SetPrimaryKey {
                    target: target.clone(),
                    columns,
                });
            } else if self.eat_keyword("UNIQUE") {
                self.eat_any_keyword(&["KEY", "INDEX"]);
                let index = self.index_body(true)?;
                changes.push(SchemaChange::CreateIndex {
                    target: target.clone(),
                    index,
                });
            } else if self.eat_any_keyword(&["FULLTEXT", "SPATIAL", "KEY", "INDEX"]) {
                self.eat_any_keyword(&["KEY", "INDEX"]);
                let index = self.index_body(false)?;
                changes.push(SchemaChange::CreateIndex {
                    target: target.clone(),
                    index,
                });
            } else if self.is_keyword("FOREIGN") {
                // Foreign keys are not tracked
            } else {
                self.eat_keyword("COLUMN");
                if self.eat_symbol('(') {
                    loop {
                        let (column, _, _) = self.column_def()?;
                        changes.push(SchemaChange::UpsertColumn {
                            target: target.clone(),
                            column,
                        });
                        if !self.eat_symbol(',') {
                            break;
                        }
                    }
                    self.expect_symbol(')')?;
                } else {
                    let (column, primary, _) = self.column_def()?;
                    let name = column.name.clone();
                    changes.push(SchemaChange::UpsertColumn {
                        target: target.clone(),
                        column,
                    });
                    if primary {
                        changes.push(SchemaChange::SetPrimaryKey {
                            target: target.clone(),
                            columns: vec![name],
                        });
                    }
                }
            }
            return Ok(());
        }

        if self.eat_keyword("DROP") {
            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                changes.push(SchemaChange::SetPrimaryKey {
                    target: target.clone(),
                    columns: Vec::new(),
                });
            } else if self.eat_any_keyword(&["INDEX", "KEY"]) {
                let name = self.ident()?;
                changes.push(SchemaChange::DropIndex {
                    target: target.clone(),
                    name,
                });
            } else if self.is_keyword("FOREIGN") || self.is_keyword("CHECK") {
                // Not tracked
            } else {
                self.eat_keyword("COLUMN");
                let column = self.ident()?;
                changes.push(SchemaChange::DropColumn {
                    target: target.clone(),
                    column,
                });
            }
            return Ok(());
        }

        if self.eat_keyword("MODIFY") {
            self.eat_keyword("COLUMN");
            let (column, _, _) = self.column_def()?;
            changes.push(SchemaChange::UpsertColumn {
                target: target.clone(),
                column,
            });
            return Ok(());
        }

        if self.eat_keyword("CHANGE") {
            self.eat_keyword("COLUMN");
            let old = self.ident()?;
            let (column, _, _) = self.column_def()?;
            changes.push(SchemaChange::ChangeColumn {
                target: target.clone(),
                old,
                column,
            });
            return Ok(());
        }

        if self.eat_keyword("RENAME") {
            if self.eat_keyword("COLUMN") {
                let old = self.ident()?;
                self.expect_keyword("TO")?;
                let new = self.ident()?;
                changes.push(SchemaChange::RenameColumn {
                    target: target.clone(),
                    old,
                    new,
                });
                return Ok(());
            }
            if self.is_keyword("INDEX") || self.is_keyword("KEY") {
                return Err(self.unsupported());
            }
            self.eat_any_keyword(&["TO", "AS"]);
            let to = self.qualified()?;
            changes.push(SchemaChange::RenameTable {
                from: target.clone(),
                to,
            });
            return Ok(());
        }

        // Column default changes and table options leave the shape unchanged
        if self.eat_keyword("ALTER")
            || self.eat_any_keyword(&[
                "ENGINE",
                "DEFAULT",
                "CHARACTER",
                "CHARSET",
                "COLLATE",
                "COMMENT",
                "AUTO_INCREMENT",
                "CONVERT",
                "ROW_FORMAT",
            ])
        {
            return Ok(());
        }

        Err(self.unsupported())
    }
}

/// Parses one statement into the catalog changes it makes.
///
/// Comment-only, empty and `SET` statements yield no changes.
pub fn parse_statement(sql: &str) -> SchemaResult<Vec<SchemaChange>> {
    Parser::new(sql)?.parse()
}

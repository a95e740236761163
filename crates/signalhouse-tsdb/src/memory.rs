//! In-process time-series engine
//!
//! `MemoryTsdb` understands the statement subset SignalHouse issues
//! (databases, super-tables, child tables, column alters and streams) and
//! answers with the same status codes as the real engine. It keeps a log of
//! every statement it receives and supports fault injection, so orchestration
//! code can be tested without a running engine.
//!
//! ```ignore
//! let engine = Arc::new(MemoryTsdb::new());
//! engine.fail_next(TsdbError::Transport("connection reset".into())).await;
//! engine.set_latency(Some(Duration::from_secs(30))).await;
//! ```

use crate::client::TsdbClient;
use crate::error::{ErrorCode, Result, TsdbError};
use crate::schema::{ColumnDef, ColumnType, TableSchema};
use async_trait::async_trait;
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token as SqlToken, Tokenizer};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

type TableKey = (String, String);

/// A child table bound to a super-table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildTable {
    pub stable: String,
    pub tags: Vec<String>,
}

/// A registered continuous query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStream {
    pub sql: String,
    pub target: TableKey,
    pub source: TableKey,
    pub paused: bool,
}

#[derive(Debug, Default)]
struct EngineState {
    databases: BTreeSet<String>,
    stables: BTreeMap<TableKey, TableSchema>,
    tables: BTreeMap<TableKey, ChildTable>,
    streams: BTreeMap<String, MemoryStream>,
    /// Tables materialized by streams
    derived: BTreeSet<TableKey>,
}

/// In-process engine with a statement log and fault injection
#[derive(Debug, Default)]
pub struct MemoryTsdb {
    state: Mutex<EngineState>,
    statements: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<TsdbError>>,
    latency: Mutex<Option<Duration>>,
    describe_calls: AtomicUsize,
}

impl MemoryTsdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error returned by the next engine call (execute or describe).
    pub async fn fail_next(&self, error: TsdbError) {
        self.failures.lock().await.push_back(error);
    }

    /// Delay every engine call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Every statement passed to `execute`, including failed ones.
    pub async fn statements(&self) -> Vec<String> {
        self.statements.lock().await.clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub async fn has_database(&self, database: &str) -> bool {
        self.state.lock().await.databases.contains(database)
    }

    pub async fn child_table(&self, database: &str, table: &str) -> Option<ChildTable> {
        self.state
            .lock()
            .await
            .tables
            .get(&(database.to_string(), table.to_string()))
            .cloned()
    }

    pub async fn stream(&self, name: &str) -> Option<MemoryStream> {
        self.state.lock().await.streams.get(name).cloned()
    }

    pub async fn stream_names(&self) -> Vec<String> {
        self.state.lock().await.streams.keys().cloned().collect()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn injected_failure(&self) -> Result<()> {
        match self.failures.lock().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TsdbClient for MemoryTsdb {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.delay().await;
        self.statements.lock().await.push(sql.to_string());
        self.injected_failure().await?;

        let mut state = self.state.lock().await;
        let result = state.apply(sql);
        debug!(statement = sql, ok = result.is_ok(), "Memory engine statement");
        result
    }

    async fn describe(&self, database: &str, table: &str) -> Result<Option<TableSchema>> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.injected_failure().await?;

        let state = self.state.lock().await;
        let key = (database.to_string(), table.to_string());

        if let Some(schema) = state.stables.get(&key) {
            return Ok(Some(schema.clone()));
        }
        if let Some(child) = state.tables.get(&key) {
            return Ok(state
                .stables
                .get(&(database.to_string(), child.stable.clone()))
                .cloned());
        }
        if state.derived.contains(&key) {
            return Ok(Some(TableSchema {
                columns: vec![ColumnDef::new("ts", ColumnType::Timestamp)],
                tags: Vec::new(),
            }));
        }
        Ok(None)
    }
}

// ============================================================
// STATEMENT INTERPRETER
// ============================================================

fn syntax(message: impl Into<String>) -> TsdbError {
    TsdbError::rejected(ErrorCode::SYNTAX_ERROR, message)
}

impl EngineState {
    fn apply(&mut self, sql: &str) -> Result<u64> {
        let mut cur = Cursor::new(tokenize(sql)?);

        if cur.eat_keyword("CREATE") {
            if cur.eat_keyword("DATABASE") {
                self.create_database(&mut cur)
            } else if cur.eat_keyword("STABLE") {
                self.create_stable(&mut cur)
            } else if cur.eat_keyword("TABLE") {
                self.create_table(&mut cur)
            } else if cur.eat_keyword("STREAM") {
                self.create_stream(&mut cur, sql)
            } else {
                Err(syntax("unsupported CREATE statement"))
            }
        } else if cur.eat_keyword("ALTER") {
            cur.expect_keyword("STABLE")?;
            self.alter_stable(&mut cur)
        } else if cur.eat_keyword("PAUSE") {
            cur.expect_keyword("STREAM")?;
            self.set_stream_paused(&mut cur, true)
        } else if cur.eat_keyword("RESUME") {
            cur.expect_keyword("STREAM")?;
            self.set_stream_paused(&mut cur, false)
        } else if cur.eat_keyword("DROP") {
            cur.expect_keyword("STREAM")?;
            self.drop_stream(&mut cur)
        } else {
            Err(syntax(format!("unsupported statement: {}", sql)))
        }
    }

    fn require_database(&self, database: &str) -> Result<()> {
        if self.databases.contains(database) {
            Ok(())
        } else {
            Err(TsdbError::rejected(
                ErrorCode::DB_NOT_EXIST,
                format!("Database not exist: {}", database),
            ))
        }
    }

    fn create_database(&mut self, cur: &mut Cursor) -> Result<u64> {
        let if_not_exists = cur.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let name = cur.name()?;

        if !self.databases.insert(name.clone()) && !if_not_exists {
            return Err(TsdbError::rejected(
                ErrorCode::DB_ALREADY_EXISTS,
                format!("Database already exists: {}", name),
            ));
        }
        Ok(0)
    }

    fn create_stable(&mut self, cur: &mut Cursor) -> Result<u64> {
        let if_not_exists = cur.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let key = cur.qualified()?;
        let columns = cur.column_list()?;
        cur.expect_keyword("TAGS")?;
        let tags = cur.column_list()?;
        cur.finish()?;

        self.require_database(&key.0)?;
        if columns.first().map(|c| c.column_type) != Some(ColumnType::Timestamp) {
            return Err(syntax("first column must be a TIMESTAMP"));
        }
        if tags.is_empty() {
            return Err(syntax("a super-table needs at least one tag"));
        }

        let mut seen = BTreeSet::new();
        for def in columns.iter().chain(tags.iter()) {
            if !seen.insert(def.name.to_ascii_lowercase()) {
                return Err(syntax(format!("duplicated column name: {}", def.name)));
            }
        }

        if self.stables.contains_key(&key) {
            if if_not_exists {
                return Ok(0);
            }
            return Err(TsdbError::rejected(
                ErrorCode::STABLE_ALREADY_EXISTS,
                format!("STable already exists: {}", key.1),
            ));
        }

        self.stables.insert(key, TableSchema { columns, tags });
        Ok(0)
    }

    fn alter_stable(&mut self, cur: &mut Cursor) -> Result<u64> {
        let key = cur.qualified()?;
        let add = if cur.eat_keyword("ADD") {
            true
        } else if cur.eat_keyword("MODIFY") {
            false
        } else {
            return Err(syntax("expected ADD or MODIFY"));
        };
        cur.expect_keyword("COLUMN")?;
        let name = cur.name()?;
        let column_type = cur.column_type()?;
        cur.finish()?;

        let schema = self.stables.get_mut(&key).ok_or_else(|| {
            TsdbError::rejected(
                ErrorCode::STABLE_NOT_EXIST,
                format!("STable not exist: {}", key.1),
            )
        })?;

        if add {
            if schema.column(&name).is_some() || schema.tag(&name).is_some() {
                return Err(TsdbError::rejected(
                    ErrorCode::COLUMN_ALREADY_EXISTS,
                    format!("Column already exists: {}", name),
                ));
            }
            schema.columns.push(ColumnDef::new(name, column_type));
            return Ok(0);
        }

        let existing = schema
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&name))
            .ok_or_else(|| {
                TsdbError::rejected(
                    ErrorCode::COLUMN_NOT_EXIST,
                    format!("Column does not exist: {}", name),
                )
            })?;

        if !existing.column_type.can_widen_to(column_type) {
            return Err(TsdbError::rejected(
                ErrorCode::INVALID_ALTER,
                format!(
                    "Invalid alter: cannot change {} from {} to {}",
                    name, existing.column_type, column_type
                ),
            ));
        }
        existing.column_type = column_type;
        Ok(0)
    }

    fn create_table(&mut self, cur: &mut Cursor) -> Result<u64> {
        let if_not_exists = cur.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let key = cur.qualified()?;
        cur.expect_keyword("USING")?;
        let stable_key = cur.qualified()?;
        cur.expect_keyword("TAGS")?;
        cur.expect_punct('(')?;
        let mut tags = vec![cur.literal()?];
        while cur.eat_punct(',') {
            tags.push(cur.literal()?);
        }
        cur.expect_punct(')')?;
        cur.finish()?;

        self.require_database(&key.0)?;
        let stable = self.stables.get(&stable_key).ok_or_else(|| {
            TsdbError::rejected(
                ErrorCode::STABLE_NOT_EXIST,
                format!("STable not exist: {}", stable_key.1),
            )
        })?;
        if stable.tags.len() != tags.len() {
            return Err(syntax(format!(
                "expected {} tag values, got {}",
                stable.tags.len(),
                tags.len()
            )));
        }

        if self.tables.contains_key(&key) {
            if if_not_exists {
                return Ok(0);
            }
            return Err(TsdbError::rejected(
                ErrorCode::TABLE_ALREADY_EXISTS,
                format!("Table already exists: {}", key.1),
            ));
        }

        self.tables.insert(
            key,
            ChildTable {
                stable: stable_key.1,
                tags,
            },
        );
        Ok(0)
    }

    fn create_stream(&mut self, cur: &mut Cursor, sql: &str) -> Result<u64> {
        let if_not_exists = cur.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let name = cur.name()?;

        if !cur.skip_to_keyword("INTO") {
            return Err(syntax("stream without INTO clause"));
        }
        let target = cur.qualified()?;
        cur.expect_keyword("AS")?;
        cur.expect_keyword("SELECT")?;
        if !cur.skip_to_keyword("FROM") {
            return Err(syntax("stream query without FROM clause"));
        }
        let source = cur.qualified()?;

        self.require_database(&target.0)?;
        let source_exists = self.stables.contains_key(&source)
            || self.tables.contains_key(&source)
            || self.derived.contains(&source);
        if !source_exists {
            return Err(TsdbError::rejected(
                ErrorCode::TABLE_NOT_EXIST,
                format!("Table does not exist: {}", source.1),
            ));
        }

        if self.streams.contains_key(&name) {
            if if_not_exists {
                return Ok(0);
            }
            return Err(TsdbError::rejected(
                ErrorCode::STREAM_ALREADY_EXISTS,
                format!("Stream already exists: {}", name),
            ));
        }

        self.derived.insert(target.clone());
        self.streams.insert(
            name,
            MemoryStream {
                sql: sql.to_string(),
                target,
                source,
                paused: false,
            },
        );
        Ok(0)
    }

    fn stream_not_exist(name: &str) -> TsdbError {
        TsdbError::rejected(
            ErrorCode::STREAM_NOT_EXIST,
            format!("Stream not exist: {}", name),
        )
    }

    fn set_stream_paused(&mut self, cur: &mut Cursor, paused: bool) -> Result<u64> {
        let if_exists = cur.eat_keywords(&["IF", "EXISTS"]);
        cur.eat_keywords(&["IGNORE", "UNTREATED"]);
        let name = cur.name()?;
        cur.finish()?;

        match self.streams.get_mut(&name) {
            Some(stream) => {
                stream.paused = paused;
                Ok(0)
            }
            None if if_exists => Ok(0),
            None => Err(Self::stream_not_exist(&name)),
        }
    }

    fn drop_stream(&mut self, cur: &mut Cursor) -> Result<u64> {
        let if_exists = cur.eat_keywords(&["IF", "EXISTS"]);
        let name = cur.name()?;
        cur.finish()?;

        if self.streams.remove(&name).is_none() && !if_exists {
            return Err(Self::stream_not_exist(&name));
        }
        Ok(0)
    }
}

// ============================================================
// TOKENIZER
// ============================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare word (keyword or unquoted name)
    Word(String),
    /// Backtick-quoted name
    Quoted(String),
    Str(String),
    Number(String),
    Punct(char),
    /// Multi-character operator such as `>=`
    Op(String),
}

impl From<SqlToken> for Token {
    fn from(token: SqlToken) -> Self {
        match token {
            SqlToken::Word(word) if word.quote_style.is_some() => Token::Quoted(word.value),
            SqlToken::Word(word) => Token::Word(word.value),
            SqlToken::SingleQuotedString(value) => Token::Str(value),
            SqlToken::Number(value, _) => Token::Number(value),
            other => {
                let text = other.to_string();
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Token::Punct(c),
                    _ => Token::Op(text),
                }
            }
        }
    }
}

/// Lex with MySQL rules: backtick names, `''` and backslash escapes.
fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let tokens = Tokenizer::new(&MySqlDialect {}, sql)
        .tokenize()
        .map_err(|e| syntax(e.to_string()))?;

    Ok(tokens
        .into_iter()
        .filter(|t| !matches!(t, SqlToken::Whitespace(_) | SqlToken::EOF))
        .map(Token::from)
        .collect())
}

struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn is_keyword_at(&self, pos: usize, keyword: &str) -> bool {
        matches!(self.tokens.get(pos), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword_at(self.pos, keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a keyword sequence only if all of it is present.
    fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let matched = keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.is_keyword_at(self.pos + i, kw));
        if matched {
            self.pos += keywords.len();
        }
        matched
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax(format!("expected {} near {:?}", keyword, self.peek())))
        }
    }

    fn eat_punct(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: char) -> Result<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(syntax(format!("expected '{}' near {:?}", punct, self.peek())))
        }
    }

    /// Advance past the next occurrence of `keyword`.
    fn skip_to_keyword(&mut self, keyword: &str) -> bool {
        while self.pos < self.tokens.len() {
            if self.eat_keyword(keyword) {
                return true;
            }
            self.pos += 1;
        }
        false
    }

    fn name(&mut self) -> Result<String> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Word(name)) | Some(Token::Quoted(name)) => {
                self.pos += 1;
                Ok(name)
            }
            other => Err(syntax(format!("expected a name, found {:?}", other))),
        }
    }

    /// `db.table`; the database part is mandatory.
    fn qualified(&mut self) -> Result<TableKey> {
        let database = self.name()?;
        if !self.eat_punct('.') {
            return Err(syntax(format!("table name without database: {}", database)));
        }
        let table = self.name()?;
        Ok((database, table))
    }

    fn column_type(&mut self) -> Result<ColumnType> {
        let name = self.name()?;
        let length = if self.eat_punct('(') {
            let length = match self.tokens.get(self.pos).cloned() {
                Some(Token::Number(n)) => n
                    .parse::<u64>()
                    .map_err(|_| syntax(format!("bad length {}", n)))?,
                other => return Err(syntax(format!("expected a length, found {:?}", other))),
            };
            self.pos += 1;
            self.expect_punct(')')?;
            length
        } else {
            0
        };

        match ColumnType::from_describe(&name, length) {
            Some(ColumnType::Varchar(0)) => Err(syntax(format!("{} needs a length", name))),
            Some(column_type) => Ok(column_type),
            None => Err(syntax(format!("unsupported type {}", name))),
        }
    }

    /// `( name type, ... )`
    fn column_list(&mut self) -> Result<Vec<ColumnDef>> {
        self.expect_punct('(')?;
        let mut columns = Vec::new();
        loop {
            let name = self.name()?;
            let column_type = self.column_type()?;
            columns.push(ColumnDef::new(name, column_type));
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(')')?;
        Ok(columns)
    }

    fn literal(&mut self) -> Result<String> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Str(value)) | Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(value)
            }
            other => Err(syntax(format!("expected a literal, found {:?}", other))),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.eat_punct(';');
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(syntax(format!("unexpected trailing token {:?}", token))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STABLE: &str = "CREATE STABLE IF NOT EXISTS `plant`.`raw_motor` \
        (`ts` TIMESTAMP, `current` DOUBLE, `status` VARCHAR(256)) \
        TAGS (`asset_id` BIGINT, `asset_code` VARCHAR(64))";

    async fn engine_with_stable() -> MemoryTsdb {
        let engine = MemoryTsdb::new();
        engine
            .execute("CREATE DATABASE IF NOT EXISTS `plant`")
            .await
            .unwrap();
        engine.execute(STABLE).await.unwrap();
        engine
    }

    #[test]
    fn test_tokenizer_handles_quotes() {
        let tokens = tokenize("TAGS (1, 'o''brien') `we ird`").unwrap();
        assert_eq!(tokens[4], Token::Str("o'brien".to_string()));
        assert_eq!(tokens[6], Token::Quoted("we ird".to_string()));
        assert!(tokenize("'open").is_err());
        assert!(tokenize("`open").is_err());
    }

    #[test]
    fn test_tokenizer_handles_backslash_escapes() {
        let tokens = tokenize(r"'a\'b' = 'c\\' ; 'd\\'' OR 1=1) --'").unwrap();
        assert_eq!(tokens[0], Token::Str("a'b".to_string()));
        assert_eq!(tokens[1], Token::Punct('='));
        assert_eq!(tokens[2], Token::Str("c\\".to_string()));
        assert_eq!(tokens[3], Token::Punct(';'));
        assert_eq!(tokens[4], Token::Str("d\\' OR 1=1) --".to_string()));
        assert_eq!(tokens.len(), 5);
    }

    #[tokio::test]
    async fn test_stable_requires_database() {
        let engine = MemoryTsdb::new();
        let err = engine.execute(STABLE).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DB_NOT_EXIST));
    }

    #[tokio::test]
    async fn test_create_and_describe() {
        let engine = engine_with_stable().await;
        let schema = engine.describe("plant", "raw_motor").await.unwrap().unwrap();
        assert_eq!(schema.columns.len(), 3);
        assert_eq!(schema.tags.len(), 2);
        assert!(engine.describe("plant", "raw_pump").await.unwrap().is_none());
        assert!(engine.describe("other", "raw_motor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_stable_without_guard() {
        let engine = engine_with_stable().await;
        let err = engine
            .execute(&STABLE.replace("IF NOT EXISTS ", ""))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_alter_rules() {
        let engine = engine_with_stable().await;
        engine
            .execute("ALTER STABLE `plant`.`raw_motor` ADD COLUMN `rpm` BIGINT")
            .await
            .unwrap();
        engine
            .execute("ALTER STABLE `plant`.`raw_motor` MODIFY COLUMN `rpm` DOUBLE")
            .await
            .unwrap();

        let err = engine
            .execute("ALTER STABLE `plant`.`raw_motor` ADD COLUMN `current` DOUBLE")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::COLUMN_ALREADY_EXISTS));

        let err = engine
            .execute("ALTER STABLE `plant`.`raw_motor` MODIFY COLUMN `status` BOOL")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::INVALID_ALTER));

        let schema = engine.describe("plant", "raw_motor").await.unwrap().unwrap();
        assert_eq!(schema.column("rpm").unwrap().column_type, ColumnType::Double);
    }

    #[tokio::test]
    async fn test_child_table() {
        let engine = engine_with_stable().await;
        let ddl = "CREATE TABLE IF NOT EXISTS `plant`.`raw_motor_MOTOR001` \
                   USING `plant`.`raw_motor` TAGS (1, 'MOTOR001')";
        engine.execute(ddl).await.unwrap();
        engine.execute(ddl).await.unwrap();

        let child = engine.child_table("plant", "raw_motor_MOTOR001").await.unwrap();
        assert_eq!(child.stable, "raw_motor");
        assert_eq!(child.tags, vec!["1".to_string(), "MOTOR001".to_string()]);

        let err = engine
            .execute("CREATE TABLE `plant`.`x` USING `plant`.`raw_pump` TAGS (1, 'X')")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::STABLE_NOT_EXIST));
    }

    #[tokio::test]
    async fn test_stream_lifecycle() {
        let engine = engine_with_stable().await;
        let sql = "CREATE STREAM IF NOT EXISTS `fs_motor_avg_g1` TRIGGER WINDOW_CLOSE \
                   INTO `plant`.`feat_motor_avg` AS SELECT _wstart AS ts, AVG(`current`) AS `avg` \
                   FROM `plant`.`raw_motor` WHERE `status` = 'run' PARTITION BY `asset_id` \
                   INTERVAL(1h) SLIDING(10m)";
        engine.execute(sql).await.unwrap();
        engine.execute(sql).await.unwrap();
        assert_eq!(engine.stream_names().await.len(), 1);

        engine.execute("PAUSE STREAM `fs_motor_avg_g1`").await.unwrap();
        assert!(engine.stream("fs_motor_avg_g1").await.unwrap().paused);
        engine
            .execute("RESUME STREAM IGNORE UNTREATED `fs_motor_avg_g1`")
            .await
            .unwrap();
        assert!(!engine.stream("fs_motor_avg_g1").await.unwrap().paused);

        // The derived table can feed another stream
        assert!(engine.table_exists("plant", "feat_motor_avg").await.unwrap());

        engine
            .execute("DROP STREAM IF EXISTS `fs_motor_avg_g1`")
            .await
            .unwrap();
        let err = engine.execute("PAUSE STREAM `fs_motor_avg_g1`").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::STREAM_NOT_EXIST));
    }

    #[tokio::test]
    async fn test_stream_source_must_exist() {
        let engine = engine_with_stable().await;
        let err = engine
            .execute(
                "CREATE STREAM `s` INTO `plant`.`t` AS SELECT _wstart AS ts, COUNT(*) AS `n` \
                 FROM `plant`.`raw_pump` INTERVAL(1m)",
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TABLE_NOT_EXIST));
    }

    #[tokio::test]
    async fn test_fault_injection_and_log() {
        let engine = MemoryTsdb::new();
        engine
            .fail_next(TsdbError::Transport("connection reset".into()))
            .await;
        assert!(engine.execute("CREATE DATABASE `plant`").await.is_err());
        engine.execute("CREATE DATABASE `plant`").await.unwrap();
        assert_eq!(engine.statements().await.len(), 2);
        assert!(engine.has_database("plant").await);

        let err = engine.execute("SELECT 1").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SYNTAX_ERROR));
    }
}

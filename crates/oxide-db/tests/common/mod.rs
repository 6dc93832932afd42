#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use oxide_db::dialect::{Dialect, GenericDialect, MySqlDialect};
use oxide_db::{
    Backend, Connection, ConnectionConfig, ErrorInfo, Execution, FieldMeta, QueryBuilder, Row,
    VecRowStream,
};

/// What the mock backend saw and how it should answer.
#[derive(Debug, Default)]
pub struct MockState {
    pub executed: Vec<String>,
    /// Statements containing any of these fragments fail.
    pub fail_containing: Vec<String>,
    /// Rows returned for statements containing the fragment.
    pub rows: Vec<(String, Vec<Row>)>,
    /// Databases that refuse connections.
    pub refuse: Vec<String>,
    pub connects: Vec<String>,
    pub affected: u64,
    pub closes: usize,
}

#[derive(Debug)]
pub struct MockBackend {
    dialect: Arc<dyn Dialect>,
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new(dialect: Arc<dyn Dialect>) -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                dialect,
                state: Arc::clone(&state),
            },
            state,
        )
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl Backend for MockBackend {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    fn connect(&mut self, config: &ConnectionConfig) -> Result<(), ErrorInfo> {
        let mut state = self.state();
        state.connects.push(config.database.clone());
        if state.refuse.contains(&config.database) {
            return Err(ErrorInfo::new(2002, "connection refused"));
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<Execution, ErrorInfo> {
        let mut state = self.state();
        state.executed.push(String::from(sql));
        if state.fail_containing.iter().any(|f| sql.contains(f.as_str())) {
            return Err(ErrorInfo::new(1064, "syntax error"));
        }
        let rows = state
            .rows
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone());
        Ok(match rows {
            Some(rows) => {
                let fields = rows
                    .first()
                    .map(|row| row.columns().map(FieldMeta::named).collect())
                    .unwrap_or_default();
                Execution::Rows(Box::new(VecRowStream::new(rows).with_fields(fields)))
            }
            None => Execution::Done,
        })
    }

    fn affected_rows(&self) -> u64 {
        self.state().affected
    }

    fn last_error(&self) -> Option<ErrorInfo> {
        None
    }

    fn close(&mut self) {
        self.state().closes += 1;
    }
}

pub fn connect_with(config: ConnectionConfig) -> (Connection, Arc<Mutex<MockState>>) {
    let (backend, state) = MockBackend::new(Arc::new(MySqlDialect));
    (Connection::new(config, Box::new(backend)), state)
}

pub fn connect() -> (Connection, Arc<Mutex<MockState>>) {
    connect_with(ConnectionConfig::new("mysql", "app"))
}

pub fn executed(state: &Arc<Mutex<MockState>>) -> Vec<String> {
    state.lock().unwrap().executed.clone()
}

pub fn mysql() -> QueryBuilder {
    QueryBuilder::new(Arc::new(MySqlDialect))
}

pub fn plain() -> QueryBuilder {
    QueryBuilder::new(Arc::new(GenericDialect::unquoted()))
}

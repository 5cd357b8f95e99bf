//! Recording connection used by the unit tests of this crate.

use ormkit_core::{Connection, Cx, Dialect, Error, Outcome, Result, Row, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub(crate) struct MockState {
    pub executed: Vec<(String, Vec<Value>)>,
    /// `(sql fragment, rows)`; the first fragment contained in a query wins
    pub responses: Vec<(String, Vec<Row>)>,
    pub affected: u64,
    pub insert_id: i64,
    pub fail_on: Option<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            executed: Vec::new(),
            responses: Vec::new(),
            affected: 1,
            insert_id: 1,
            fail_on: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MockConnection {
    pub state: Arc<Mutex<MockState>>,
    dialect: Dialect,
}

impl MockConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            dialect,
        }
    }

    pub fn respond(&self, fragment: &str, rows: Vec<Row>) {
        self.state
            .lock()
            .expect("lock poisoned")
            .responses
            .push((fragment.to_string(), rows));
    }

    pub fn fail_on(&self, fragment: &str) {
        self.state.lock().expect("lock poisoned").fail_on = Some(fragment.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("lock poisoned")
            .executed
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn params(&self, index: usize) -> Vec<Value> {
        self.state.lock().expect("lock poisoned").executed[index].1.clone()
    }

    fn record(&self, sql: &str, params: &[Value]) -> std::result::Result<(), Error> {
        let mut guard = self.state.lock().expect("lock poisoned");
        guard.executed.push((sql.to_string(), params.to_vec()));
        match &guard.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => {
                Err(Error::Custom(format!("mock failure on {fragment}")))
            }
            _ => Ok(()),
        }
    }
}

impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let recorded = self.record(sql, params);
        let rows = {
            let guard = self.state.lock().expect("lock poisoned");
            guard
                .responses
                .iter()
                .find(|(fragment, _)| sql.contains(fragment.as_str()))
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default()
        };
        async move {
            match recorded {
                Ok(()) => Outcome::Ok(rows),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let recorded = self.record(sql, params);
        let affected = self.state.lock().expect("lock poisoned").affected;
        async move {
            match recorded {
                Ok(()) => Outcome::Ok(affected),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let recorded = self.record(sql, params);
        let id = self.state.lock().expect("lock poisoned").insert_id;
        async move {
            match recorded {
                Ok(()) => Outcome::Ok(id),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async { Outcome::Ok(()) }
    }

    fn close(self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

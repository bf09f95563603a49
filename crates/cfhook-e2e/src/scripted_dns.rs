//! Scripted TXT resolver for E2E tests
//!
//! Answers are handed out in order; once the script runs out the last answer
//! repeats, which models a record that has finished propagating (or never
//! will).

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use cfhook::{LookupFailure, TxtLookup};

type Answer = Result<Vec<String>, LookupFailure>;

pub struct ScriptedLookup {
    script: Mutex<VecDeque<Answer>>,
    last: Mutex<Answer>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    /// Resolver that answers NXDOMAIN until scripted otherwise
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(Err(LookupFailure::NxDomain)),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Queue an answer
    pub fn push(&self, answer: Result<Vec<&str>, LookupFailure>) {
        let answer = answer.map(|values| values.into_iter().map(String::from).collect());
        self.script.lock().push_back(answer);
    }

    /// Names queried so far, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl TxtLookup for ScriptedLookup {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
        self.queries.lock().push(name.to_string());

        let next = self.script.lock().pop_front();
        match next {
            Some(answer) => {
                *self.last.lock() = answer.clone();
                answer
            }
            None => self.last.lock().clone(),
        }
    }
}

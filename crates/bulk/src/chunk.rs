use anyhow::{Context, Result};

use crate::action::{Action, Operation};

/// A batch of actions sent in one sink call, with its bulk NDJSON body.
#[derive(Debug, Default, Clone)]
pub struct Chunk {
    actions: Vec<Action>,
    body: Vec<u8>,
}

impl Chunk {
    fn push(&mut self, action: Action, encoded: Vec<u8>) {
        self.actions.push(action);
        self.body.extend_from_slice(&encoded);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.actions.iter().map(Action::operation).collect()
    }

    /// Encoded bulk request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serialized size in bytes.
    pub fn bytes(&self) -> usize {
        self.body.len()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Groups a stream of actions into chunks of at most `chunk_size` actions and
/// `max_bytes` serialized bytes.
///
/// A chunk is closed as soon as it holds `chunk_size` actions, or when the
/// next action would push it over `max_bytes`; that action then starts the
/// next chunk. An action larger than `max_bytes` on its own forms a chunk by
/// itself. An error in the stream is yielded once (the partially filled chunk
/// is discarded) and ends the iteration.
pub struct Chunker<I> {
    actions: I,
    chunk_size: usize,
    max_bytes: usize,
    carry: Option<(Action, Vec<u8>)>,
    done: bool,
}

impl<I> Chunker<I>
where
    I: Iterator<Item = Result<Action>>,
{
    pub fn new(actions: I, chunk_size: usize, max_bytes: usize) -> Self {
        Self {
            actions,
            chunk_size: chunk_size.max(1),
            max_bytes,
            carry: None,
            done: false,
        }
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<Chunk>> {
        self.done = true;
        self.carry = None;
        Some(Err(err))
    }
}

impl<I> Iterator for Chunker<I>
where
    I: Iterator<Item = Result<Action>>,
{
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = Chunk::default();
        if let Some((action, encoded)) = self.carry.take() {
            chunk.push(action, encoded);
        }

        loop {
            if chunk.len() >= self.chunk_size {
                return Some(Ok(chunk));
            }

            let action = match self.actions.next() {
                Some(Ok(action)) => action,
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.done = true;
                    return if chunk.is_empty() {
                        None
                    } else {
                        Some(Ok(chunk))
                    };
                }
            };

            let encoded = match action
                .encode()
                .with_context(|| format!("Failed to encode action for {}", action.id()))
            {
                Ok(encoded) => encoded,
                Err(e) => return self.fail(e),
            };

            if !chunk.is_empty() && chunk.bytes() + encoded.len() > self.max_bytes {
                self.carry = Some((action, encoded));
                return Some(Ok(chunk));
            }

            chunk.push(action, encoded);
        }
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;

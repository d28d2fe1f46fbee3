// In-memory list storage engine

use super::{InsertPosition, ListStorage, StorageError, StorageResult};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

type List = VecDeque<Bytes>;

/// A single logical database
pub struct DbInstance {
    data: DashMap<Bytes, List>,
}

impl DbInstance {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    /// Remove `key` if its list has been drained
    fn drop_if_empty(&self, key: &[u8]) {
        self.data.remove_if(key, |_, list| list.is_empty());
    }

    fn push(&self, key: &[u8], values: &[Bytes], front: bool) -> usize {
        let mut list = self.data.entry(Bytes::copy_from_slice(key)).or_default();
        for value in values {
            if front {
                list.push_front(value.clone());
            } else {
                list.push_back(value.clone());
            }
        }
        list.len()
    }

    fn push_existing(&self, key: &[u8], values: &[Bytes], front: bool) -> StorageResult<usize> {
        let mut list = self.data.get_mut(key).ok_or(StorageError::NotFound)?;
        for value in values {
            if front {
                list.push_front(value.clone());
            } else {
                list.push_back(value.clone());
            }
        }
        Ok(list.len())
    }

    fn pop(&self, key: &[u8], count: usize, front: bool) -> StorageResult<Vec<Bytes>> {
        let popped = {
            let mut list = self.data.get_mut(key).ok_or(StorageError::NotFound)?;
            let n = count.min(list.len());
            let mut popped = Vec::with_capacity(n);
            for _ in 0..n {
                let item = if front { list.pop_front() } else { list.pop_back() };
                match item {
                    Some(item) => popped.push(item),
                    None => break,
                }
            }
            popped
        };
        self.drop_if_empty(key);
        Ok(popped)
    }
}

impl Default for DbInstance {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a Redis-style inclusive range against a list length
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Resolve a possibly negative single index
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    if index < 0 || index >= len {
        None
    } else {
        Some(index as usize)
    }
}

/// In-memory engine: one `DbInstance` per logical database
pub struct MemoryStorage {
    databases: Vec<DbInstance>,
}

impl MemoryStorage {
    pub fn new(num_dbs: usize) -> Self {
        let databases = (0..num_dbs).map(|_| DbInstance::new()).collect();
        Self { databases }
    }

    pub fn get_db(&self, index: usize) -> StorageResult<&DbInstance> {
        self.databases
            .get(index)
            .ok_or_else(|| StorageError::InvalidArgument(format!("invalid database index {}", index)))
    }
}

impl ListStorage for MemoryStorage {
    fn lpush(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize> {
        Ok(self.get_db(db)?.push(key, values, true))
    }

    fn rpush(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize> {
        Ok(self.get_db(db)?.push(key, values, false))
    }

    fn lpushx(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize> {
        self.get_db(db)?.push_existing(key, values, true)
    }

    fn rpushx(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize> {
        self.get_db(db)?.push_existing(key, values, false)
    }

    fn lpop(&self, db: usize, key: &[u8], count: usize) -> StorageResult<Vec<Bytes>> {
        self.get_db(db)?.pop(key, count, true)
    }

    fn rpop(&self, db: usize, key: &[u8], count: usize) -> StorageResult<Vec<Bytes>> {
        self.get_db(db)?.pop(key, count, false)
    }

    fn lrange(&self, db: usize, key: &[u8], start: i64, stop: i64) -> StorageResult<Vec<Bytes>> {
        let instance = self.get_db(db)?;
        let list = instance.data.get(key).ok_or(StorageError::NotFound)?;
        Ok(match resolve_range(start, stop, list.len()) {
            Some((start, stop)) => list.range(start..=stop).cloned().collect(),
            None => Vec::new(),
        })
    }

    fn lrem(&self, db: usize, key: &[u8], count: i64, value: &[u8]) -> StorageResult<usize> {
        let instance = self.get_db(db)?;
        let removed = {
            let mut list = instance.data.get_mut(key).ok_or(StorageError::NotFound)?;
            let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
            let mut removed = 0;
            if count >= 0 {
                let mut i = 0;
                while i < list.len() && removed < limit {
                    if list[i] == value {
                        list.remove(i);
                        removed += 1;
                    } else {
                        i += 1;
                    }
                }
            } else {
                let mut i = list.len();
                while i > 0 && removed < limit {
                    i -= 1;
                    if list[i] == value {
                        list.remove(i);
                        removed += 1;
                    }
                }
            }
            removed
        };
        instance.drop_if_empty(key);
        Ok(removed)
    }

    fn ltrim(&self, db: usize, key: &[u8], start: i64, stop: i64) -> StorageResult<()> {
        let instance = self.get_db(db)?;
        {
            let mut list = instance.data.get_mut(key).ok_or(StorageError::NotFound)?;
            match resolve_range(start, stop, list.len()) {
                Some((start, stop)) => {
                    list.truncate(stop + 1);
                    list.drain(..start);
                }
                None => list.clear(),
            }
        }
        instance.drop_if_empty(key);
        Ok(())
    }

    fn lset(&self, db: usize, key: &[u8], index: i64, value: Bytes) -> StorageResult<()> {
        let instance = self.get_db(db)?;
        let mut list = instance.data.get_mut(key).ok_or(StorageError::NotFound)?;
        let index = resolve_index(index, list.len())
            .ok_or_else(|| StorageError::Corruption("index out of range".to_string()))?;
        list[index] = value;
        Ok(())
    }

    fn linsert(
        &self,
        db: usize,
        key: &[u8],
        position: InsertPosition,
        pivot: &[u8],
        value: Bytes,
    ) -> StorageResult<i64> {
        let instance = self.get_db(db)?;
        let mut list = instance.data.get_mut(key).ok_or(StorageError::NotFound)?;
        let at = match list.iter().position(|item| item == pivot) {
            Some(at) => at,
            None => return Ok(-1),
        };
        match position {
            InsertPosition::Before => list.insert(at, value),
            InsertPosition::After => list.insert(at + 1, value),
        }
        Ok(list.len() as i64)
    }

    fn lindex(&self, db: usize, key: &[u8], index: i64) -> StorageResult<Bytes> {
        let instance = self.get_db(db)?;
        let list = instance.data.get(key).ok_or(StorageError::NotFound)?;
        resolve_index(index, list.len())
            .and_then(|i| list.get(i).cloned())
            .ok_or(StorageError::NotFound)
    }

    fn llen(&self, db: usize, key: &[u8]) -> StorageResult<usize> {
        let instance = self.get_db(db)?;
        let list = instance.data.get(key).ok_or(StorageError::NotFound)?;
        Ok(list.len())
    }

    fn rpoplpush(&self, db: usize, source: &[u8], destination: &[u8]) -> StorageResult<Bytes> {
        let instance = self.get_db(db)?;

        if source == destination {
            let mut list = instance.data.get_mut(source).ok_or(StorageError::NotFound)?;
            let item = list.pop_back().ok_or(StorageError::NotFound)?;
            list.push_front(item.clone());
            return Ok(item);
        }

        // Two shard guards at once can deadlock, so pop and push in sequence
        let item = instance
            .pop(source, 1, false)?
            .pop()
            .ok_or(StorageError::NotFound)?;
        instance.push(destination, std::slice::from_ref(&item), true);
        Ok(item)
    }

    fn del(&self, db: usize, keys: &[Bytes]) -> StorageResult<usize> {
        let instance = self.get_db(db)?;
        Ok(keys
            .iter()
            .filter(|key| instance.data.remove(key.as_ref()).is_some())
            .count())
    }

    fn exists(&self, db: usize, keys: &[Bytes]) -> StorageResult<usize> {
        let instance = self.get_db(db)?;
        Ok(keys
            .iter()
            .filter(|key| instance.data.contains_key(key.as_ref()))
            .count())
    }

    fn keys(&self, db: usize, pattern: &[u8]) -> StorageResult<Vec<Bytes>> {
        let instance = self.get_db(db)?;
        Ok(instance
            .data
            .iter()
            .filter(|entry| match_pattern(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    fn db_size(&self, db: usize) -> StorageResult<usize> {
        Ok(self.get_db(db)?.len())
    }

    fn flush_db(&self, db: usize) -> StorageResult<()> {
        self.get_db(db)?.clear();
        Ok(())
    }

    fn flush_all(&self) -> StorageResult<()> {
        for db in &self.databases {
            db.clear();
        }
        Ok(())
    }

    fn key_type(&self, db: usize, key: &[u8]) -> StorageResult<Option<&'static str>> {
        let instance = self.get_db(db)?;
        Ok(instance.data.contains_key(key).then_some("list"))
    }
}

/// Glob-style matching as used by KEYS and CONFIG GET.
///
/// Supports `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes. Only the
/// most recent `*` is retried on a mismatch, so the work is bounded by
/// `pattern.len() * text.len()`.
pub fn match_pattern(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Pattern index after the last `*` and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if pattern.get(p) == Some(&b'*') {
            p += 1;
            backtrack = Some((p, t));
            continue;
        }
        if let Some(next) = match_single(pattern, p, text[t]) {
            p = next;
            t += 1;
            continue;
        }
        match backtrack {
            Some((star_p, star_t)) => {
                p = star_p;
                t = star_t + 1;
                backtrack = Some((star_p, t));
            }
            None => return false,
        }
    }

    pattern[p.min(pattern.len())..].iter().all(|&b| b == b'*')
}

/// Match one non-`*` pattern element at `p` against `c`, returning the index
/// of the next element on success
fn match_single(pattern: &[u8], p: usize, c: u8) -> Option<usize> {
    match pattern.get(p)? {
        b'?' => Some(p + 1),
        b'[' => {
            let mut i = p + 1;
            let negate = pattern.get(i) == Some(&b'^');
            if negate {
                i += 1;
            }
            let mut matched = false;
            loop {
                match &pattern[i.min(pattern.len())..] {
                    [] => break,
                    [b']', ..] => {
                        i += 1;
                        break;
                    }
                    [b'\\', escaped, ..] => {
                        matched |= *escaped == c;
                        i += 2;
                    }
                    [lo, b'-', hi, ..] if *hi != b']' => {
                        let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                        matched |= (lo..=hi).contains(&c);
                        i += 3;
                    }
                    [single, ..] => {
                        matched |= *single == c;
                        i += 1;
                    }
                }
            }
            (matched != negate).then_some(i)
        }
        b'\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        &literal => (literal == c).then_some(p + 1),
    }
}

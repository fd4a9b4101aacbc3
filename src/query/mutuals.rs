//! Mutuals as a merge-join of two key-ordered index scans.
//!
//! Each side is the ACTIVE following set of one user read in ascending followee id
//! order, `batch` rows at a time. Memory is bounded by two batches plus the page,
//! whatever the size of either set.

use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::error::Result;
use crate::model::{KeyCursor, Page, UserId};
use crate::store;

struct KeyStream<'a> {
    user: &'a UserId,
    buffer: VecDeque<UserId>,
    last: Option<UserId>,
    batch: usize,
    exhausted: bool,
}

impl<'a> KeyStream<'a> {
    fn new(user: &'a UserId, after: Option<UserId>, batch: usize) -> Self {
        Self {
            user,
            buffer: VecDeque::with_capacity(batch),
            last: after,
            batch,
            exhausted: false,
        }
    }

    fn next(&mut self, conn: &Connection) -> Result<Option<UserId>> {
        if self.buffer.is_empty() && !self.exhausted {
            let rows = store::following_ids_after(conn, self.user, self.last.as_ref(), self.batch)?;
            if rows.len() < self.batch {
                self.exhausted = true;
            }
            if let Some(last) = rows.last() {
                self.last = Some(last.clone());
            }
            self.buffer.extend(rows);
        }
        Ok(self.buffer.pop_front())
    }
}

/// Up to `limit` users followed by both `a` and `b` with id greater than `after`
pub(crate) fn merge_join(
    conn: &Connection,
    a: &UserId,
    b: &UserId,
    after: Option<UserId>,
    limit: usize,
    batch: usize,
) -> Result<Page<UserId>> {
    let mut left = KeyStream::new(a, after.clone(), batch);
    let mut right = KeyStream::new(b, after, batch);
    let mut items = Vec::with_capacity(limit);

    let mut x = left.next(conn)?;
    let mut y = right.next(conn)?;
    while let (Some(l), Some(r)) = (&x, &y) {
        match l.cmp(r) {
            Ordering::Less => x = left.next(conn)?,
            Ordering::Greater => y = right.next(conn)?,
            Ordering::Equal => {
                if items.len() == limit {
                    // A further match exists, so hand out a cursor
                    let next_cursor = items.last().map(|u: &UserId| KeyCursor(u.clone()).encode());
                    return Ok(Page { items, next_cursor });
                }
                items.push(l.clone());
                x = left.next(conn)?;
                y = right.next(conn)?;
            }
        }
    }
    Ok(Page {
        items,
        next_cursor: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{uid, Harness};
    use std::collections::BTreeSet;

    async fn follow_all(h: &Harness, who: &UserId, targets: &[&str]) {
        for t in targets {
            let target = h.user(t, false).await;
            h.follow.follow_user(who, &target).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_mutuals_intersection_and_symmetry() {
        let h = Harness::new().await;
        let (a, b) = (h.user("a", false).await, h.user("b", false).await);
        follow_all(&h, &a, &["m1", "m3", "x1", "m2", "x2"]).await;
        follow_all(&h, &b, &["m2", "y1", "m1", "m3"]).await;

        let ab = h.query.get_mutuals(&a, &b, None, None).await.unwrap();
        let ba = h.query.get_mutuals(&b, &a, None, None).await.unwrap();
        assert_eq!(ab.items, vec![uid("m1"), uid("m2"), uid("m3")]);
        let left: BTreeSet<_> = ab.items.into_iter().collect();
        let right: BTreeSet<_> = ba.items.into_iter().collect();
        assert_eq!(left, right);
    }

    #[tokio::test]
    async fn test_mutuals_pagination_with_small_batches() {
        let h = Harness::with_merge_batch(2).await;
        let (a, b) = (h.user("a", false).await, h.user("b", false).await);
        let shared = ["s1", "s2", "s3", "s4", "s5"];
        follow_all(&h, &a, &shared).await;
        follow_all(&h, &a, &["a1", "a2", "a3"]).await;
        follow_all(&h, &b, &shared).await;
        follow_all(&h, &b, &["b1"]).await;

        let mut collected = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = h.query.get_mutuals(&a, &b, cursor.as_deref(), Some(2)).await.unwrap();
            assert!(page.items.len() <= 2);
            collected.extend(page.items);
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        let expected: Vec<_> = shared.iter().map(|s| uid(s)).collect();
        assert_eq!(collected, expected);
    }

    #[tokio::test]
    async fn test_pending_edges_are_not_mutual() {
        let h = Harness::new().await;
        let (a, b, p) = (h.user("a", false).await, h.user("b", false).await, h.user("p", true).await);
        h.follow.follow_user(&a, &p).await.unwrap();
        h.follow.follow_user(&b, &p).await.unwrap();
        h.follow.accept_follow_request(&p, &a).await.unwrap();

        let page = h.query.get_mutuals(&a, &b, None, None).await.unwrap();
        assert!(page.items.is_empty());
    }
}

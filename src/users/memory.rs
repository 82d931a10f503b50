use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User},
};

/// In-process store with the same per-column uniqueness as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<User>,
    last_id: i64,
}

impl Inner {
    fn collides(&self, skip_id: Option<i64>, user: &NewUser) -> bool {
        self.rows
            .iter()
            .filter(|u| Some(u.id) != skip_id)
            .any(|u| u.username == user.username || u.email == user.email)
    }
}

impl MemoryUserStore {
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().expect("store lock").rows.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .rows
            .iter()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.rows.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.rows.iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.collides(None, &user) {
            return Err(StoreError::UniqueViolation);
        }
        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: inner.last_id,
            username: user.username,
            email: user.email,
            password: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, user: NewUser) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.collides(Some(id), &user) {
            return Err(StoreError::UniqueViolation);
        }
        let Some(row) = inner.rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        row.username = user.username;
        row.email = user.email;
        row.password = user.password_hash;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        let before = inner.rows.len();
        inner.rows.retain(|u| u.id != id);
        Ok(inner.rows.len() != before)
    }

    async fn list_paged(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .rows
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_and_not_reused() {
        let store = MemoryUserStore::default();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        let b = store.insert(new_user("b", "b@x.com")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(store.delete(b.id).await.unwrap());
        let c = store.insert(new_user("c", "c@x.com")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn enforces_per_column_uniqueness() {
        let store = MemoryUserStore::default();
        store.insert(new_user("a", "a@x.com")).await.unwrap();
        assert!(matches!(
            store.insert(new_user("a", "other@x.com")).await,
            Err(StoreError::UniqueViolation)
        ));
        assert!(matches!(
            store.insert(new_user("other", "a@x.com")).await,
            Err(StoreError::UniqueViolation)
        ));
    }

    #[tokio::test]
    async fn update_may_keep_own_values() {
        let store = MemoryUserStore::default();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        let updated = store.update(a.id, new_user("a", "a@x.com")).await.unwrap();
        assert_eq!(updated.map(|u| u.id), Some(a.id));
        assert_eq!(store.update(99, new_user("z", "z@x.com")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_slices_in_insertion_order() {
        let store = MemoryUserStore::default();
        for i in 0..5 {
            store
                .insert(new_user(&format!("u{i}"), &format!("u{i}@x.com")))
                .await
                .unwrap();
        }
        let page = store.list_paged(2, 1).await.unwrap();
        let names: Vec<_> = page.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["u1", "u2"]);
        assert!(store.list_paged(10, 10).await.unwrap().is_empty());
    }
}

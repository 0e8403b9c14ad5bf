//! Typed view over one collection.
//!
//! `Collection<T>` pins a collection name and a record shape to a borrowed
//! `ApiClient`. Every method delegates to the client with the name filled in
//! and `T` as the decode target; there is no state of its own.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::ApiClient;
use crate::error::Result;
use crate::types::{CreateResult, ListOptions, ListResult};

pub struct Collection<'a, T> {
    client: &'a ApiClient,
    name: String,
    _record: PhantomData<fn() -> T>,
}

impl<'a, T> Collection<'a, T> {
    pub fn new(client: &'a ApiClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &'a ApiClient {
        self.client
    }
}

impl<T: DeserializeOwned> Collection<'_, T> {
    pub fn get_list(&self, options: &ListOptions) -> Result<ListResult<T>> {
        self.client.list(&self.name, options)
    }

    pub fn get_one(&self, id: &str) -> Result<T> {
        self.client.get_one(&self.name, id)
    }
}

impl<T: Serialize> Collection<'_, T> {
    pub fn create(&self, data: &T) -> Result<CreateResult> {
        self.client.create(&self.name, data)
    }

    pub fn update(&self, id: &str, data: &T) -> Result<()> {
        self.client.update(&self.name, id, data)
    }
}

impl<T> Collection<'_, T> {
    pub fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&self.name, id)
    }
}

impl<T> Clone for Collection<'_, T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            name: self.name.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Collection<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish_non_exhaustive()
    }
}

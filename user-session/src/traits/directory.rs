// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;
use std::sync::Arc;

use crate::resource::{Component, PortfolioMembers};

/// Read access to components and the membership of composite resources.
///
/// `None` is returned for resources the directory doesn't know about.
pub trait ResourceDirectory {
    type Error: Error;

    /// Load a component by UUID.
    fn component(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<Component>, Self::Error>>;

    /// UUIDs of the projects an application is made of, in the order they were added.
    fn application_members(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>, Self::Error>>;

    /// Projects and sub-portfolios directly nested in a portfolio.
    fn portfolio_members(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<PortfolioMembers>, Self::Error>>;
}

impl<T> ResourceDirectory for Arc<T>
where
    T: ResourceDirectory,
{
    type Error = T::Error;

    fn component(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<Component>, T::Error>> {
        self.as_ref().component(uuid)
    }

    fn application_members(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>, T::Error>> {
        self.as_ref().application_members(uuid)
    }

    fn portfolio_members(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<PortfolioMembers>, T::Error>> {
        self.as_ref().portfolio_members(uuid)
    }
}

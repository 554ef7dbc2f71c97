//! Contracts of the source of truth.
//!
//! The cache never talks to the relational store directly: bulk reads go
//! through [`SourceReader`] and row-level changes arrive through a
//! [`ChangeFeed`]. How either is backed (SQL driver, LISTEN/NOTIFY, a message
//! bus) is the implementor's concern.

use crate::entities::{Application, Blockchain, LoadBalancer, PayPlan, Redirect};
use crate::error::SourceError;
use crate::notification::Notification;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

/// Bulk reads of every entity collection.
///
/// Each call returns the full current set of its collection.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read_pay_plans(&self) -> Result<Vec<PayPlan>, SourceError>;

    async fn read_applications(&self) -> Result<Vec<Application>, SourceError>;

    async fn read_blockchains(&self) -> Result<Vec<Blockchain>, SourceError>;

    async fn read_redirects(&self) -> Result<Vec<Redirect>, SourceError>;

    async fn read_load_balancers(&self) -> Result<Vec<LoadBalancer>, SourceError>;
}

/// Stream of row-level change notifications.
#[async_trait]
pub trait ChangeFeed: Send + 'static {
    /// Wait for the next notification.
    ///
    /// Returns `None` once the feed is closed for good.
    async fn recv(&mut self) -> Option<Notification>;
}

#[async_trait]
impl ChangeFeed for mpsc::Receiver<Notification> {
    async fn recv(&mut self) -> Option<Notification> {
        mpsc::Receiver::recv(self).await
    }
}

#[async_trait]
impl ChangeFeed for mpsc::UnboundedReceiver<Notification> {
    async fn recv(&mut self) -> Option<Notification> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

#[async_trait]
impl ChangeFeed for broadcast::Receiver<Notification> {
    async fn recv(&mut self) -> Option<Notification> {
        loop {
            match broadcast::Receiver::recv(self).await {
                Ok(notification) => return Some(notification),
                // Missed notifications are recovered by the next snapshot reload.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

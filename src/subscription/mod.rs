// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer registries for connection and session events.
//!
//! # Overview
//!
//! - [`CallbackRegistry`] - Ordered registry that stores callbacks and dispatches events
//! - [`SubscriptionId`] - A unique identifier for a registered callback
//! - [`Subscription`] - Disposer returned on registration, used to unsubscribe
//!
//! Callbacks are invoked synchronously in registration order. A
//! [`Subscription`] does not unsubscribe on drop; call
//! [`Subscription::unsubscribe`] explicitly.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! use brewlink::subscription::CallbackRegistry;
//!
//! let registry: Arc<CallbackRegistry<u32>> = Arc::new(CallbackRegistry::new());
//! let total = Arc::new(AtomicU32::new(0));
//!
//! let sink = Arc::clone(&total);
//! let subscription = registry.subscribe(move |value: &u32| {
//!     sink.fetch_add(*value, Ordering::SeqCst);
//! });
//!
//! registry.dispatch(&5);
//! assert!(subscription.unsubscribe());
//! registry.dispatch(&5);
//!
//! assert_eq!(total.load(Ordering::SeqCst), 5);
//! ```

mod callback;

pub use callback::{CallbackRegistry, Subscription, SubscriptionId};

// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A cheap, clonable cancellation handle: one writer, many readers. Polled
//! at stage boundaries in the pipeline and before each per-hole fill in the
//! parallel filler. Replaces the original engine's raw shared-pointer cancel
//! flags with an owned, `Send`-by-value handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_token_observes_cancel() {
        let token = CancelToken::new();
        let reader = token.clone();
        assert!(!reader.is_cancelled());
        token.cancel();
        assert!(reader.is_cancelled());
    }
}

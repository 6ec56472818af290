// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Per-call interceptor hooks.
//!
//! Interceptors compose as an ordered list: pre-hooks run in
//! registration order before the request is dispatched, post-hooks run
//! in reverse order on the response. A pre-hook error short-circuits
//! the call before anything touches the network; post-hooks never see
//! errors.

use std::any::Any;
use std::sync::Arc;

use cortex_types::{Metadata, Status};

use crate::method::MethodDescriptor;

/// Type-erased view of a request or response message.
///
/// Interceptors are registered per client and see every method, so they
/// receive messages type-erased and downcast to the types they care
/// about.
pub trait AnyMessage: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send> AnyMessage for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A pair of hooks applied around each call.
pub trait Interceptor: Send + Sync {
    /// Runs before dispatch; may mutate the request and the metadata.
    fn pre(
        &self,
        method: &MethodDescriptor,
        request: &mut dyn AnyMessage,
        metadata: &mut Metadata,
    ) -> Result<(), Status> {
        let _ = (method, request, metadata);
        Ok(())
    }

    /// Runs after a successful response; may transform it.
    fn post(
        &self,
        method: &MethodDescriptor,
        response: &mut dyn AnyMessage,
    ) -> Result<(), Status> {
        let _ = (method, response);
        Ok(())
    }
}

/// Ordered interceptor list. Read-only after construction.
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run all pre-hooks in registration order; the first error stops
    /// the walk and is returned.
    pub fn pre(
        &self,
        method: &MethodDescriptor,
        request: &mut dyn AnyMessage,
        metadata: &mut Metadata,
    ) -> Result<(), Status> {
        for interceptor in &self.interceptors {
            interceptor.pre(method, request, metadata)?;
        }
        Ok(())
    }

    /// Run all post-hooks in reverse registration order.
    pub fn post(
        &self,
        method: &MethodDescriptor,
        response: &mut dyn AnyMessage,
    ) -> Result<(), Status> {
        for interceptor in self.interceptors.iter().rev() {
            interceptor.post(method, response)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::method::MethodKind;

    fn method() -> MethodDescriptor {
        MethodDescriptor::new("cortex.test.v1.TestService", "Probe", MethodKind::Unary)
    }

    #[derive(Default)]
    struct ProbeRequest {
        tag: String,
    }

    /// Records invocations into a shared log.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_pre: bool,
    }

    impl Interceptor for Recorder {
        fn pre(
            &self,
            _method: &MethodDescriptor,
            request: &mut dyn AnyMessage,
            metadata: &mut Metadata,
        ) -> Result<(), Status> {
            self.log.lock().unwrap().push(format!("{}.pre", self.name));
            if self.fail_pre {
                return Err(Status::failed_precondition("pre-hook rejected"));
            }
            if let Some(request) = request.as_any_mut().downcast_mut::<ProbeRequest>() {
                request.tag.push_str(self.name);
            }
            metadata.append("x-seen-by", self.name);
            Ok(())
        }

        fn post(
            &self,
            _method: &MethodDescriptor,
            _response: &mut dyn AnyMessage,
        ) -> Result<(), Status> {
            self.log.lock().unwrap().push(format!("{}.post", self.name));
            Ok(())
        }
    }

    fn chain(log: &Arc<Mutex<Vec<String>>>, fail: Option<&'static str>) -> InterceptorChain {
        let mut chain = InterceptorChain::new();
        for name in ["i1", "i2", "i3"] {
            chain = chain.with(Arc::new(Recorder {
                name,
                log: log.clone(),
                fail_pre: fail == Some(name),
            }));
        }
        chain
    }

    #[test]
    fn test_pre_in_order_post_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(&log, None);
        let method = method();

        let mut request = ProbeRequest::default();
        let mut metadata = Metadata::new();
        chain.pre(&method, &mut request, &mut metadata).unwrap();
        let mut response = ProbeRequest::default();
        chain.post(&method, &mut response).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["i1.pre", "i2.pre", "i3.pre", "i3.post", "i2.post", "i1.post"]
        );
        // Mutations from every pre-hook are visible, in order.
        assert_eq!(request.tag, "i1i2i3");
        assert_eq!(metadata.get_all("x-seen-by").count(), 3);
    }

    #[test]
    fn test_pre_error_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(&log, Some("i2"));
        let method = method();

        let mut request = ProbeRequest::default();
        let mut metadata = Metadata::new();
        let err = chain.pre(&method, &mut request, &mut metadata).unwrap_err();
        assert_eq!(err.code(), cortex_types::Code::FailedPrecondition);

        // i3.pre never ran; post-hooks are the caller's responsibility
        // and are not invoked on error.
        assert_eq!(*log.lock().unwrap(), vec!["i1.pre", "i2.pre"]);
    }
}

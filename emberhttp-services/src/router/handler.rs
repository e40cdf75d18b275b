//! Handler registration: the `Handler<Args>` family, the request handle
//! handlers use to produce a response, and the arity-erasing glue that lets
//! the router store handlers of differing signatures in one list.
//!
//! Rather than generating one router specialization per handler signature,
//! every handler is coerced down to a uniform `Vec<Value> -> ()` entry point
//! at registration time, and the per-signature work happens once, in a
//! handful of blanket trait impls.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use emberhttp_core::context::PeerAddr;
use emberhttp_core::{Request, Response};

use super::value::{CoercionError, FromValue, Value};

/// Handed to a handler so it can read the request and hand back a response.
///
/// Response production is synchronous from the connection engine's point of
/// view: once the handler's future resolves, the slot must be filled, or the
/// connection treats that as an application error.
pub struct RequestHandle {
    request: Rc<Request>,
    peer: PeerAddr,
    response: RefCell<Option<Response>>,
}

impl RequestHandle {
    pub fn new(request: Rc<Request>, peer: impl Into<PeerAddr>) -> Self {
        RequestHandle {
            request,
            peer: peer.into(),
            response: RefCell::new(None),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The address of the connected peer, handed down from the socket the
    /// connection engine accepted this request on.
    pub fn peer(&self) -> PeerAddr {
        self.peer
    }

    /// Enqueues `response` as the result of handling this request. Calling
    /// this more than once overwrites the previous response; only the last
    /// call before the handler's future resolves takes effect.
    pub fn respond(&self, response: Response) {
        *self.response.borrow_mut() = Some(response);
    }

    pub(crate) fn into_response(self) -> Option<Response> {
        self.response.into_inner()
    }
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a>>;

/// Implemented for plain closures/fns of the shape
/// `Fn(A1, ..., An, Rc<RequestHandle>) -> impl Future<Output = ()>`.
///
/// `Args` is the tuple of coerced path/query arguments; see the
/// `impl_handler!` invocations below for the supported arities.
pub trait Handler<Args>: Clone + 'static {
    fn call(&self, args: Args, handle: Rc<RequestHandle>) -> HandlerFuture<'_>;
}

/// Implemented for every argument tuple a `Handler` may be generic over.
/// Bridges the router's untyped `Vec<Value>` to a concrete, typed tuple.
pub trait ArgTuple: Sized {
    const ARITY: usize;

    fn optional_flags() -> Vec<bool>;

    fn build(values: Vec<Value>) -> Result<Self, CoercionError>;
}

impl ArgTuple for () {
    const ARITY: usize = 0;

    fn optional_flags() -> Vec<bool> {
        Vec::new()
    }

    fn build(_values: Vec<Value>) -> Result<Self, CoercionError> {
        Ok(())
    }
}

impl<F, Fut> Handler<()> for F
where
    F: Fn(Rc<RequestHandle>) -> Fut + Clone + 'static,
    Fut: Future<Output = ()> + 'static,
{
    fn call(&self, _args: (), handle: Rc<RequestHandle>) -> HandlerFuture<'_> {
        Box::pin((self)(handle))
    }
}

macro_rules! impl_handler {
    ($($idx:tt => $ty:ident),+ $(,)?) => {
        impl<$($ty: FromValue),+> ArgTuple for ($($ty,)+) {
            const ARITY: usize = impl_handler!(@count $($ty)+);

            fn optional_flags() -> Vec<bool> {
                vec![$($ty::OPTIONAL),+]
            }

            fn build(mut values: Vec<Value>) -> Result<Self, CoercionError> {
                if values.len() < Self::ARITY {
                    values.resize_with(Self::ARITY, || Value::Missing);
                }
                let mut iter = values.into_iter();
                Ok((
                    $({
                        let position = $idx;
                        $ty::from_value(iter.next().expect("length checked above"), position)?
                    },)+
                ))
            }
        }

        impl<F, Fut, $($ty: FromValue + 'static),+> Handler<($($ty,)+)> for F
        where
            F: Fn($($ty,)+ Rc<RequestHandle>) -> Fut + Clone + 'static,
            Fut: Future<Output = ()> + 'static,
        {
            #[allow(non_snake_case)]
            fn call(&self, args: ($($ty,)+), handle: Rc<RequestHandle>) -> HandlerFuture<'_> {
                let ($($ty,)+) = args;
                Box::pin((self)($($ty,)+ handle))
            }
        }
    };
    (@count $($ty:ident)+) => {
        <[()]>::len(&[$(impl_handler!(@unit $ty)),+])
    };
    (@unit $ty:ident) => { () };
}

impl_handler!(0 => A1);
impl_handler!(0 => A1, 1 => A2);
impl_handler!(0 => A1, 1 => A2, 2 => A3);
impl_handler!(0 => A1, 1 => A2, 2 => A3, 3 => A4);
impl_handler!(0 => A1, 1 => A2, 2 => A3, 3 => A4, 4 => A5);
impl_handler!(0 => A1, 1 => A2, 2 => A3, 3 => A4, 4 => A5, 5 => A6);

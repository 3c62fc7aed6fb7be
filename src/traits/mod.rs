pub mod dispatch;
pub mod middleware;

pub use dispatch::{factory_fn, predicate_fn, FactoryFn, MiddlewareFactory, Predicate, PredicateFn};
pub use middleware::{from_fn, BoxFuture, Chain, Middleware, MiddlewareFn, MiddlewareProvider, Next};

//! Transform stages for the stagewire library.
//!
//! This module provides the stages that sit between a source and a sink:
//! [`Map`], [`FlatMap`], [`Filter`] and [`PassThrough`], plus the
//! [`fan_out`] and [`merge`] combinators built on top of them.
//!
//! Every stage takes a parallelism factor. With parallelism 1 a stage emits
//! elements in arrival order; with more workers the order is unspecified.

pub mod combinators;
pub(crate) mod engine;

pub use combinators::{fan_out, merge};

use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::mpsc;

use crate::config::StageConfig;
use crate::core::{Feed, Flow, Inlet, Outlet, Result, Source, Supervisor};
use engine::{ProcessFn, StageCore};

/// Takes one element and produces one element.
///
/// ```text
/// in  -- 1 -- 2 ---- 3 -- 4 ------ 5 --
///        |    |      |    |        |
///    [------------- f ----------------]
///        |    |      |    |        |
/// out -- 1' - 2' --- 3' - 4' ----- 5' -
/// ```
#[derive(Debug)]
pub struct Map<In, Out> {
    core: StageCore<In, Out>,
}

impl<In, Out> Map<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Create a map stage with `parallelism` workers.
    ///
    /// Use parallelism 1 when the order of elements matters.
    pub fn new<F, Fut>(supervisor: &Supervisor, f: F, parallelism: usize) -> Self
    where
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Out>> + Send + 'static,
    {
        Self::with_config(
            supervisor,
            f,
            StageConfig::named("map").parallelism(parallelism),
        )
    }

    /// Create a map stage from a full [`StageConfig`].
    pub fn with_config<F, Fut>(supervisor: &Supervisor, f: F, config: StageConfig) -> Self
    where
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Out>> + Send + 'static,
    {
        let process: ProcessFn<In, Out> = Arc::new(move |item: In| {
            let mapped = f(item);
            async move { mapped.await.map(|out| vec![out]) }.boxed()
        });
        Self {
            core: StageCore::launch(supervisor, config, process),
        }
    }

    /// The stage name used in logs and metrics
    pub fn name(&self) -> &str {
        self.core.name()
    }
}

impl<In: Send + 'static, Out: Send + 'static> Outlet for Map<In, Out> {
    type Out = Out;

    fn supervisor(&self) -> &Supervisor {
        self.core.supervisor()
    }

    fn into_feed(self) -> Feed<Out> {
        self.core.into_feed()
    }
}

impl<In: Send + 'static, Out: Send + 'static> Inlet for Map<In, Out> {
    type In = In;

    fn take_inlet(&mut self) -> Option<mpsc::Sender<In>> {
        self.core.take_inlet()
    }
}

impl<In: Send + 'static, Out: Send + 'static> Source for Map<In, Out> {}
impl<In: Send + 'static, Out: Send + 'static> Flow for Map<In, Out> {}

/// Takes one element and produces zero, one, or more elements.
///
/// ```text
/// in  -- 1 -- 2 ---- 3 -- 4 ------ 5 --
///        |    |      |    |        |
///    [------------- f ----------------]
///        |    |           |   |    |
/// out -- 1' - 2' -------- 4'- 4''- 5' -
/// ```
#[derive(Debug)]
pub struct FlatMap<In, Out> {
    core: StageCore<In, Out>,
}

impl<In, Out> FlatMap<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Create a flat-map stage with `parallelism` workers.
    ///
    /// The elements returned for one input are emitted in order.
    pub fn new<F, Fut>(supervisor: &Supervisor, f: F, parallelism: usize) -> Self
    where
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Out>>> + Send + 'static,
    {
        Self::with_config(
            supervisor,
            f,
            StageConfig::named("flat_map").parallelism(parallelism),
        )
    }

    /// Create a flat-map stage from a full [`StageConfig`].
    pub fn with_config<F, Fut>(supervisor: &Supervisor, f: F, config: StageConfig) -> Self
    where
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Out>>> + Send + 'static,
    {
        let process: ProcessFn<In, Out> = Arc::new(move |item: In| f(item).boxed());
        Self {
            core: StageCore::launch(supervisor, config, process),
        }
    }

    /// The stage name used in logs and metrics
    pub fn name(&self) -> &str {
        self.core.name()
    }
}

impl<In: Send + 'static, Out: Send + 'static> Outlet for FlatMap<In, Out> {
    type Out = Out;

    fn supervisor(&self) -> &Supervisor {
        self.core.supervisor()
    }

    fn into_feed(self) -> Feed<Out> {
        self.core.into_feed()
    }
}

impl<In: Send + 'static, Out: Send + 'static> Inlet for FlatMap<In, Out> {
    type In = In;

    fn take_inlet(&mut self) -> Option<mpsc::Sender<In>> {
        self.core.take_inlet()
    }
}

impl<In: Send + 'static, Out: Send + 'static> Source for FlatMap<In, Out> {}
impl<In: Send + 'static, Out: Send + 'static> Flow for FlatMap<In, Out> {}

/// Passes on the elements that satisfy a predicate and drops the rest.
///
/// ```text
/// in  -- 1 -- 2 ---- 3 -- 4 ------ 5 --
///        |    |      |    |        |
///    [---------- predicate -----------]
///        |    |                    |
/// out -- 1 -- 2 ------------------ 5 --
/// ```
#[derive(Debug)]
pub struct Filter<T> {
    core: StageCore<T, T>,
}

impl<T: Send + 'static> Filter<T> {
    /// Create a filter stage with `parallelism` workers.
    pub fn new<P>(supervisor: &Supervisor, predicate: P, parallelism: usize) -> Self
    where
        P: Fn(&T) -> Result<bool> + Send + Sync + 'static,
    {
        Self::with_config(
            supervisor,
            predicate,
            StageConfig::named("filter").parallelism(parallelism),
        )
    }

    /// Create a filter stage from a full [`StageConfig`].
    pub fn with_config<P>(supervisor: &Supervisor, predicate: P, config: StageConfig) -> Self
    where
        P: Fn(&T) -> Result<bool> + Send + Sync + 'static,
    {
        let process: ProcessFn<T, T> = Arc::new(move |item: T| {
            let kept = predicate(&item).map(|keep| if keep { vec![item] } else { Vec::new() });
            future::ready(kept).boxed()
        });
        Self {
            core: StageCore::launch(supervisor, config, process),
        }
    }

    /// The stage name used in logs and metrics
    pub fn name(&self) -> &str {
        self.core.name()
    }
}

impl<T: Send + 'static> Outlet for Filter<T> {
    type Out = T;

    fn supervisor(&self) -> &Supervisor {
        self.core.supervisor()
    }

    fn into_feed(self) -> Feed<T> {
        self.core.into_feed()
    }
}

impl<T: Send + 'static> Inlet for Filter<T> {
    type In = T;

    fn take_inlet(&mut self) -> Option<mpsc::Sender<T>> {
        self.core.take_inlet()
    }
}

impl<T: Send + 'static> Source for Filter<T> {}
impl<T: Send + 'static> Flow for Filter<T> {}

/// Emits every element as is, in order, with a single worker.
///
/// ```text
/// in  -- 1 -- 2 ---- 3 -- 4 ------ 5 --
///        |    |      |    |        |
/// out -- 1 -- 2 ---- 3 -- 4 ------ 5 --
/// ```
#[derive(Debug)]
pub struct PassThrough<T> {
    core: StageCore<T, T>,
}

impl<T: Send + 'static> PassThrough<T> {
    /// Create a pass-through stage.
    pub fn new(supervisor: &Supervisor) -> Self {
        Self::named(supervisor, "pass_through")
    }

    pub(crate) fn named<S: Into<String>>(supervisor: &Supervisor, name: S) -> Self {
        let process: ProcessFn<T, T> = Arc::new(identity::<T>);
        Self {
            core: StageCore::launch(supervisor, StageConfig::named(name), process),
        }
    }

    /// The stage name used in logs and metrics
    pub fn name(&self) -> &str {
        self.core.name()
    }
}

fn identity<T: Send + 'static>(item: T) -> BoxFuture<'static, Result<Vec<T>>> {
    future::ready(Ok(vec![item])).boxed()
}

impl<T: Send + 'static> Outlet for PassThrough<T> {
    type Out = T;

    fn supervisor(&self) -> &Supervisor {
        self.core.supervisor()
    }

    fn into_feed(self) -> Feed<T> {
        self.core.into_feed()
    }
}

impl<T: Send + 'static> Inlet for PassThrough<T> {
    type In = T;

    fn take_inlet(&mut self) -> Option<mpsc::Sender<T>> {
        self.core.take_inlet()
    }
}

impl<T: Send + 'static> Source for PassThrough<T> {}
impl<T: Send + 'static> Flow for PassThrough<T> {}

// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::case::{Case, CaseOutput, Exception};
use itertools::Itertools;
use serde_json::Value;
use std::{any::Any, fmt, rc::Rc};

type Instance = Box<dyn Any>;
type Constructor = Box<dyn Fn() -> Result<Instance, Exception>>;
type Disposer = Box<dyn Fn(Instance) -> Result<(), Exception>>;
type Invoker = Rc<dyn Fn(&mut dyn Any, &[Value], &mut CaseOutput) -> Result<Option<Value>, Exception>>;

/// A test class: a name, a way to construct and release instances, and the method bindings that
/// were discovered for it.
///
/// The engine never inspects type metadata. Everything it needs to run a class is supplied here,
/// already resolved, by the code that builds the [`Assembly`](crate::runner::Assembly).
pub struct TestClass {
    name: String,
    construct: Constructor,
    dispose: Disposer,
    bindings: Vec<MethodBinding>,
}

impl TestClass {
    /// Starts building a class whose instances are created by `construct`.
    pub fn build<T, F>(name: impl Into<String>, construct: F) -> ClassBuilder<T>
    where
        T: 'static,
        F: Fn() -> Result<T, Exception> + 'static,
    {
        ClassBuilder {
            name: name.into(),
            construct: Box::new(construct),
            dispose: None,
            bindings: Vec::new(),
        }
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The method bindings, in discovery order.
    pub fn bindings(&self) -> &[MethodBinding] {
        &self.bindings
    }

    /// Creates a case for every binding whose method is selected, in discovery order.
    pub fn cases(&self, mut selected: impl FnMut(&str) -> bool) -> Vec<Case> {
        self.bindings
            .iter()
            .filter(|binding| selected(&binding.method))
            .map(|binding| Case::new(&self.name, &binding.method, binding.parameters.clone()))
            .collect()
    }

    /// The distinct method names, in discovery order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .map(|binding| binding.method.as_str())
            .unique()
    }

    pub(crate) fn construct(&self) -> Result<Instance, Exception> {
        (self.construct)()
    }

    pub(crate) fn dispose(&self, instance: Instance) -> Result<(), Exception> {
        (self.dispose)(instance)
    }

    pub(crate) fn binding_for(&self, case: &Case) -> Option<&MethodBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.method == case.method() && binding.parameters == case.parameters())
    }
}

impl fmt::Debug for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass")
            .field("name", &self.name)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// A method together with one set of bound parameter values.
#[derive(Clone)]
pub struct MethodBinding {
    method: String,
    parameters: Vec<Value>,
    invoker: Invoker,
}

impl MethodBinding {
    /// The method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The bound parameter values.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub(crate) fn invoke(
        &self,
        instance: &mut dyn Any,
        output: &mut CaseOutput,
    ) -> Result<Option<Value>, Exception> {
        (self.invoker)(instance, &self.parameters, output)
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("method", &self.method)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// What a test method may return.
pub trait MethodResult {
    /// Converts into the value recorded on the case, or the failure.
    fn into_method_result(self) -> Result<Option<Value>, Exception>;
}

impl MethodResult for () {
    fn into_method_result(self) -> Result<Option<Value>, Exception> {
        Ok(None)
    }
}

impl MethodResult for Result<(), Exception> {
    fn into_method_result(self) -> Result<Option<Value>, Exception> {
        self.map(|()| None)
    }
}

impl MethodResult for Result<Value, Exception> {
    fn into_method_result(self) -> Result<Option<Value>, Exception> {
        self.map(Some)
    }
}

impl MethodResult for Result<Option<Value>, Exception> {
    fn into_method_result(self) -> Result<Option<Value>, Exception> {
        self
    }
}

/// Builds a [`TestClass`] for instances of type `T`.
pub struct ClassBuilder<T> {
    name: String,
    construct: Box<dyn Fn() -> Result<T, Exception>>,
    dispose: Option<Box<dyn Fn(T) -> Result<(), Exception>>>,
    bindings: Vec<MethodBinding>,
}

impl<T: 'static> ClassBuilder<T> {
    /// Adds a zero-argument method.
    pub fn method<F, R>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T, &mut CaseOutput) -> R + 'static,
        R: MethodResult,
    {
        self.method_with(name, vec![Vec::new()], move |instance, _, output| f(instance, output))
    }

    /// Adds a parameterized method, with one binding per parameter set.
    pub fn method_with<F, R>(
        mut self,
        name: impl Into<String>,
        parameter_sets: Vec<Vec<Value>>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut T, &[Value], &mut CaseOutput) -> R + 'static,
        R: MethodResult,
    {
        let name = name.into();
        let class_name = self.name.clone();
        let invoker: Invoker = Rc::new(move |instance, parameters, output| {
            let instance = instance
                .downcast_mut::<T>()
                .ok_or_else(|| instance_mismatch(&class_name))?;
            f(instance, parameters, output).into_method_result()
        });
        self.bindings
            .extend(parameter_sets.into_iter().map(|parameters| MethodBinding {
                method: name.clone(),
                parameters,
                invoker: invoker.clone(),
            }));
        self
    }

    /// Sets how instances are released. By default, instances are dropped.
    pub fn dispose_with<F>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Result<(), Exception> + 'static,
    {
        self.dispose = Some(Box::new(f));
        self
    }

    /// Finishes building the class.
    pub fn build(self) -> TestClass {
        let construct = self.construct;
        let dispose = self.dispose;
        let class_name = self.name.clone();
        TestClass {
            name: self.name,
            construct: Box::new(move || construct().map(|instance| Box::new(instance) as Instance)),
            dispose: Box::new(move |instance| {
                let instance = instance
                    .downcast::<T>()
                    .map_err(|_| instance_mismatch(&class_name))?;
                match &dispose {
                    Some(dispose) => dispose(*instance),
                    None => Ok(()),
                }
            }),
            bindings: self.bindings,
        }
    }
}

fn instance_mismatch(class_name: &str) -> Exception {
    Exception::new(format!(
        "instance passed to a method of `{class_name}` was not created by its constructor"
    ))
}

//! Flow definitions and the registry that picks the next one to run.

use std::sync::Arc;

use flowfuzz_gen::{ArgSpec, Args, GenError, RandomStream};

use crate::sut::{StateSnapshot, SutError, SystemUnderTest};

/// Executor for one flow: generated arguments in, SUT mutation, snapshot out.
pub type FlowFn<S> = Arc<dyn Fn(&mut S, &Args) -> Result<StateSnapshot, SutError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("flow '{0}' is already registered")]
    DuplicateFlow(String),

    #[error("flow '{flow}' declares parameter '{param}' twice")]
    DuplicateParam { flow: String, param: String },

    #[error("flow '{flow}' parameter '{param}': {source}")]
    Generator {
        flow: String,
        param: String,
        #[source]
        source: GenError,
    },

    #[error("flow '{flow}' has invalid weight {weight}")]
    InvalidWeight { flow: String, weight: f64 },

    #[error("no flow can be selected (registry empty or all weights zero)")]
    NoSelectableFlow,
}

/// A named state-mutating operation plus the generators for its arguments.
pub struct FlowDef<S> {
    name: String,
    params: Vec<(String, ArgSpec)>,
    weight: Option<f64>,
    executor: Option<FlowFn<S>>,
}

impl<S> FlowDef<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            weight: None,
            executor: None,
        }
    }

    /// Add a parameter. Parameters are generated in the order added.
    pub fn arg(mut self, name: impl Into<String>, spec: ArgSpec) -> Self {
        self.params.push((name.into(), spec));
        self
    }

    /// Relative selection weight. Flows without one count as 1.0.
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn executor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut S, &Args) -> Result<StateSnapshot, SutError> + Send + Sync + 'static,
    {
        self.executor = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, ArgSpec)] {
        &self.params
    }

    fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        for (i, (param, spec)) in self.params.iter().enumerate() {
            if self.params[..i].iter().any(|(p, _)| p == param) {
                return Err(RegistryError::DuplicateParam {
                    flow: self.name.clone(),
                    param: param.clone(),
                });
            }
            spec.validate().map_err(|source| RegistryError::Generator {
                flow: self.name.clone(),
                param: param.clone(),
                source,
            })?;
        }
        if let Some(weight) = self.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RegistryError::InvalidWeight {
                    flow: self.name.clone(),
                    weight,
                });
            }
        }
        Ok(())
    }

    /// Draw every argument from `stream`, in declaration order.
    pub fn generate_args(&self, stream: &mut RandomStream) -> Result<Args, GenError> {
        let mut args = Args::new();
        for (param, spec) in &self.params {
            let value = spec.generate(stream)?;
            debug_assert!(spec.contains(&value));
            args.push(param.clone(), value);
        }
        Ok(args)
    }
}

impl<S: SystemUnderTest> FlowDef<S> {
    /// Run the flow: the explicit executor if one was given, otherwise
    /// `sut.call(name, args)`.
    pub fn execute(&self, sut: &mut S, args: &Args) -> Result<StateSnapshot, SutError> {
        match &self.executor {
            Some(f) => f(sut, args),
            None => sut.call(&self.name, args),
        }
    }
}

impl<S> Clone for FlowDef<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            weight: self.weight,
            executor: self.executor.clone(),
        }
    }
}

impl<S> std::fmt::Debug for FlowDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("weight", &self.weight)
            .field("custom_executor", &self.executor.is_some())
            .finish()
    }
}

/// The set of flows available to a sequence.
///
/// Selection is uniform (one index draw) unless at least one flow carries a
/// weight, in which case a single unit draw is rolled against the weights.
pub struct FlowRegistry<S> {
    flows: Vec<FlowDef<S>>,
}

impl<S> FlowRegistry<S> {
    pub fn new() -> Self {
        Self { flows: Vec::new() }
    }

    pub fn register(&mut self, flow: FlowDef<S>) -> Result<(), RegistryError> {
        if self.get(flow.name()).is_some() {
            return Err(RegistryError::DuplicateFlow(flow.name.clone()));
        }
        flow.validate()?;
        self.flows.push(flow);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FlowDef<S>> {
        self.flows.iter().find(|f| f.name == name)
    }

    pub fn flows(&self) -> &[FlowDef<S>] {
        &self.flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    fn is_weighted(&self) -> bool {
        self.flows.iter().any(|f| f.weight.is_some())
    }

    /// Check that [`FlowRegistry::select_next`] can always return a flow.
    pub fn ensure_selectable(&self) -> Result<(), RegistryError> {
        let total: f64 = self.flows.iter().map(FlowDef::effective_weight).sum();
        if self.flows.is_empty() || total <= 0.0 {
            return Err(RegistryError::NoSelectableFlow);
        }
        Ok(())
    }

    /// Pick the next flow to run.
    pub fn select_next(&self, stream: &mut RandomStream) -> Option<&FlowDef<S>> {
        if self.flows.is_empty() {
            return None;
        }
        if !self.is_weighted() {
            return self.flows.get(stream.index(self.flows.len()));
        }

        let total: f64 = self.flows.iter().map(FlowDef::effective_weight).sum();
        if total <= 0.0 {
            return None;
        }

        let mut roll = stream.unit() * total;
        for flow in &self.flows {
            roll -= flow.effective_weight();
            if roll < 0.0 {
                return Some(flow);
            }
        }

        // Float residue: fall back to the last selectable flow.
        self.flows.iter().rev().find(|f| f.effective_weight() > 0.0)
    }
}

impl<S> Default for FlowRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for FlowRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            flows: self.flows.clone(),
        }
    }
}

impl<S> std::fmt::Debug for FlowRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.flows.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl SystemUnderTest for Nop {
        fn call(&mut self, _flow: &str, _args: &Args) -> Result<StateSnapshot, SutError> {
            Ok(StateSnapshot::Null)
        }
    }

    fn registry(flows: Vec<FlowDef<Nop>>) -> FlowRegistry<Nop> {
        let mut reg = FlowRegistry::new();
        for f in flows {
            reg.register(f).unwrap();
        }
        reg
    }

    #[test]
    fn test_duplicate_flow_rejected() {
        let mut reg = registry(vec![FlowDef::new("deposit")]);
        assert_eq!(
            reg.register(FlowDef::new("deposit")),
            Err(RegistryError::DuplicateFlow("deposit".to_string()))
        );
    }

    #[test]
    fn test_invalid_spec_rejected_at_registration() {
        let mut reg: FlowRegistry<Nop> = FlowRegistry::new();
        let err = reg
            .register(FlowDef::new("deposit").arg("amount", ArgSpec::int(10, 1, 0.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Generator {
                source: GenError::InvalidRange { .. },
                ..
            }
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_uniform_selection_reaches_every_flow() {
        let reg = registry(vec![
            FlowDef::new("a"),
            FlowDef::new("b"),
            FlowDef::new("c"),
        ]);
        let mut stream = RandomStream::new(42);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..100 {
            seen.insert(reg.select_next(&mut stream).unwrap().name().to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_zero_weight_flow_never_selected() {
        let reg = registry(vec![
            FlowDef::new("never").weight(0.0),
            FlowDef::new("always").weight(2.0),
        ]);
        let mut stream = RandomStream::new(42);
        for _ in 0..200 {
            assert_eq!(reg.select_next(&mut stream).unwrap().name(), "always");
        }
    }

    #[test]
    fn test_all_zero_weights_not_selectable() {
        let reg = registry(vec![FlowDef::new("a").weight(0.0)]);
        assert_eq!(reg.ensure_selectable(), Err(RegistryError::NoSelectableFlow));
        let empty: FlowRegistry<Nop> = FlowRegistry::new();
        assert_eq!(empty.ensure_selectable(), Err(RegistryError::NoSelectableFlow));
    }

    #[test]
    fn test_default_executor_dispatches_to_call() {
        struct Recorder(Vec<String>);
        impl SystemUnderTest for Recorder {
            fn call(&mut self, flow: &str, _args: &Args) -> Result<StateSnapshot, SutError> {
                self.0.push(flow.to_string());
                Ok(StateSnapshot::Null)
            }
        }

        let flow: FlowDef<Recorder> = FlowDef::new("withdraw");
        let mut sut = Recorder(Vec::new());
        flow.execute(&mut sut, &Args::new()).unwrap();
        assert_eq!(sut.0, vec!["withdraw".to_string()]);
    }
}

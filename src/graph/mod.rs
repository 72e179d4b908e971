//! A serializable two-input/one-output computation graph carrying the
//! fallback-add behavior. The accelerated kernel cannot be captured into a
//! graph; only the host semantics are.

pub mod file;

use std::{
    cell::RefCell,
    rc::Rc,
};

use crate::utils;

/// How a module's computation is captured into a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    /// Execute the module once on example inputs and record the concrete
    /// operation sequence.
    Trace,
    /// Walk the module's defined computation without executing it.
    Script,
}

pub type ValueId = u32;

/// Length of the example inputs used for trace capture.
const EXAMPLE_TRACE_LEN: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Add {
        lhs: ValueId,
        rhs: ValueId,
        out: ValueId,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Graph {
    num_inputs: u32,
    num_values: u32,
    output: ValueId,
    ops: Vec<Op>,
}

impl Graph {
    pub fn num_inputs(&self) -> u32 {
        self.num_inputs
    }

    pub fn num_values(&self) -> u32 {
        self.num_values
    }

    pub fn output(&self) -> ValueId {
        self.output
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Check id ranges and that every value is defined exactly once before
    /// use. Run by the builder and again when loading an artifact.
    pub(crate) fn validate(&self) -> Result<(), GraphError> {
        let num_values = self.num_values as usize;

        if self.num_inputs as usize > num_values {
            return Err(GraphError::InvalidValueId {
                id: self.num_inputs,
                num_values: self.num_values,
            });
        }

        let mut defined = vec![false; num_values];
        for slot in defined.iter_mut().take(self.num_inputs as usize) {
            *slot = true;
        }

        let check_id = |id: ValueId| {
            if (id as usize) < num_values {
                Ok(id)
            }
            else {
                Err(GraphError::InvalidValueId {
                    id,
                    num_values: self.num_values,
                })
            }
        };

        for op in &self.ops {
            match *op {
                Op::Add { lhs, rhs, out } => {
                    for id in [check_id(lhs)?, check_id(rhs)?] {
                        if !defined[id as usize] {
                            return Err(GraphError::UndefinedValue { id });
                        }
                    }
                    let out = check_id(out)?;
                    if defined[out as usize] {
                        return Err(GraphError::RedefinedValue { id: out });
                    }
                    defined[out as usize] = true;
                }
            }
        }

        let output = check_id(self.output)?;
        if !defined[output as usize] {
            return Err(GraphError::UndefinedValue { id: output });
        }

        Ok(())
    }

    /// Evaluate the graph on the host. Inputs must all have the same length;
    /// the output has that length too.
    pub fn run(&self, inputs: &[&[f32]]) -> Result<Vec<f32>, GraphError> {
        if inputs.len() != self.num_inputs as usize {
            return Err(GraphError::ArityMismatch {
                expected: self.num_inputs as usize,
                got: inputs.len(),
            });
        }

        if let Some(first) = inputs.first() {
            for input in inputs {
                if input.len() != first.len() {
                    return Err(GraphError::InputSize {
                        first: first.len(),
                        second: input.len(),
                    });
                }
            }
        }

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; self.num_values as usize];
        for (slot, input) in slots.iter_mut().zip(inputs) {
            *slot = Some(input.to_vec());
        }

        for op in &self.ops {
            match *op {
                Op::Add { lhs, rhs, out } => {
                    let value = {
                        let lhs = read_slot(&slots, lhs)?;
                        let rhs = read_slot(&slots, rhs)?;
                        lhs.iter().zip(rhs).map(|(a, b)| a + b).collect()
                    };
                    slots[out as usize] = Some(value);
                }
            }
        }

        slots
            .get_mut(self.output as usize)
            .and_then(Option::take)
            .ok_or(GraphError::UndefinedValue { id: self.output })
    }
}

fn read_slot(slots: &[Option<Vec<f32>>], id: ValueId) -> Result<&Vec<f32>, GraphError> {
    slots
        .get(id as usize)
        .and_then(Option::as_ref)
        .ok_or(GraphError::UndefinedValue { id })
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("expected {expected} inputs, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("input length mismatch: {first} != {second}")]
    InputSize { first: usize, second: usize },

    #[error("value {id} used before it is defined")]
    UndefinedValue { id: ValueId },

    #[error("value {id} defined more than once")]
    RedefinedValue { id: ValueId },

    #[error("value id {id} out of range ({num_values} values)")]
    InvalidValueId { id: ValueId, num_values: u32 },
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    num_inputs: u32,
    num_values: u32,
    ops: Vec<Op>,
}

impl GraphBuilder {
    /// Declare an input. Inputs occupy the first value slots, so they must be
    /// declared before any op.
    pub fn input(&mut self) -> ValueId {
        debug_assert!(self.ops.is_empty());
        self.num_inputs += 1;
        self.fresh()
    }

    pub fn add(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        let out = self.fresh();
        self.ops.push(Op::Add { lhs, rhs, out });
        out
    }

    fn fresh(&mut self) -> ValueId {
        let id = self.num_values;
        self.num_values += 1;
        id
    }

    pub fn finish(self, output: ValueId) -> Result<Graph, GraphError> {
        let graph = Graph {
            num_inputs: self.num_inputs,
            num_values: self.num_values,
            output,
            ops: self.ops,
        };
        graph.validate()?;
        Ok(graph)
    }
}

/// Seam between the module's defined computation and the capture strategies.
trait Value: Sized {
    fn add(&self, other: &Self) -> Self;
}

/// The stateless export unit: two inputs, one output, fallback-add semantics.
#[derive(Debug, Default)]
pub struct AddModule;

impl AddModule {
    /// The module's computation, expressed over an abstract value type so the
    /// capture strategies can intercept it.
    fn express<V: Value>(&self, x: &V, y: &V) -> V {
        x.add(y)
    }

    /// Eager forward pass.
    pub fn forward(&self, x: &[f32], y: &[f32]) -> Result<Vec<f32>, GraphError> {
        if x.len() != y.len() {
            return Err(GraphError::InputSize {
                first: x.len(),
                second: y.len(),
            });
        }

        let out = self.express(
            &Eager {
                data: x.to_vec(),
            },
            &Eager {
                data: y.to_vec(),
            },
        );
        Ok(out.data)
    }
}

struct Eager {
    data: Vec<f32>,
}

impl Value for Eager {
    fn add(&self, other: &Self) -> Self {
        Self {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }
}

/// Symbolic value for script capture. Records ops, never touches data.
struct Symbolic {
    id: ValueId,
    builder: Rc<RefCell<GraphBuilder>>,
}

impl Symbolic {
    fn input(builder: &Rc<RefCell<GraphBuilder>>) -> Self {
        Self {
            id: builder.borrow_mut().input(),
            builder: builder.clone(),
        }
    }
}

impl Value for Symbolic {
    fn add(&self, other: &Self) -> Self {
        Self {
            id: self.builder.borrow_mut().add(self.id, other.id),
            builder: self.builder.clone(),
        }
    }
}

/// Traced value for trace capture. Executes the op for real and records it.
struct Traced {
    id: ValueId,
    data: Vec<f32>,
    tape: Rc<RefCell<GraphBuilder>>,
}

impl Traced {
    fn input(tape: &Rc<RefCell<GraphBuilder>>, data: Vec<f32>) -> Self {
        Self {
            id: tape.borrow_mut().input(),
            data,
            tape: tape.clone(),
        }
    }
}

impl Value for Traced {
    fn add(&self, other: &Self) -> Self {
        Self {
            id: self.tape.borrow_mut().add(self.id, other.id),
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
            tape: self.tape.clone(),
        }
    }
}

/// Capture `module` into a graph with the chosen strategy.
pub fn capture(module: &AddModule, mode: CaptureMode) -> Result<Graph, GraphError> {
    match mode {
        CaptureMode::Trace => trace(module),
        CaptureMode::Script => script(module),
    }
}

fn script(module: &AddModule) -> Result<Graph, GraphError> {
    let builder = Rc::new(RefCell::new(GraphBuilder::default()));

    let x = Symbolic::input(&builder);
    let y = Symbolic::input(&builder);
    let out = module.express(&x, &y);
    let output = out.id;
    drop((x, y, out));

    let builder = Rc::try_unwrap(builder)
        .expect("capture must not hold on to builder references")
        .into_inner();
    builder.finish(output)
}

fn trace(module: &AddModule) -> Result<Graph, GraphError> {
    let tape = Rc::new(RefCell::new(GraphBuilder::default()));

    let x = Traced::input(&tape, utils::random_vec(EXAMPLE_TRACE_LEN));
    let y = Traced::input(&tape, utils::random_vec(EXAMPLE_TRACE_LEN));
    let out = module.express(&x, &y);
    let output = out.id;
    tracing::debug!(
        ops = tape.borrow().ops.len(),
        output_len = out.data.len(),
        "traced example execution"
    );
    drop((x, y, out));

    let tape = Rc::try_unwrap(tape)
        .expect("capture must not hold on to builder references")
        .into_inner();
    tape.finish(output)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn both_capture_modes_agree() {
        let module = AddModule;
        let traced = capture(&module, CaptureMode::Trace).unwrap();
        let scripted = capture(&module, CaptureMode::Script).unwrap();
        assert_eq!(traced, scripted);
        assert_eq!(traced.num_inputs(), 2);
        assert_eq!(traced.ops().len(), 1);
    }

    #[test]
    fn run_matches_forward() {
        let module = AddModule;
        let graph = capture(&module, CaptureMode::Script).unwrap();

        let x = [1.0_f32, -2.0, 0.5];
        let y = [4.0_f32, 0.25, -0.5];
        assert_eq!(
            graph.run(&[&x, &y]).unwrap(),
            module.forward(&x, &y).unwrap()
        );
    }

    #[test]
    fn run_rejects_wrong_arity() {
        let graph = capture(&AddModule, CaptureMode::Script).unwrap();
        assert!(matches!(
            graph.run(&[&[1.0_f32][..]]),
            Err(GraphError::ArityMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn run_rejects_length_mismatch() {
        let graph = capture(&AddModule, CaptureMode::Script).unwrap();
        assert!(matches!(
            graph.run(&[&[1.0_f32, 2.0][..], &[1.0_f32][..]]),
            Err(GraphError::InputSize { .. })
        ));
    }

    #[test]
    fn validate_rejects_undefined_values() {
        let mut builder = GraphBuilder::default();
        let x = builder.input();
        let out = builder.add(x, 7);
        assert!(matches!(
            builder.finish(out),
            Err(GraphError::InvalidValueId { id: 7, .. })
        ));
    }
}

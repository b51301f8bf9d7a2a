use crate::synth::operator::Operator;

/// Operators per voice. Index 0 is the conventional carrier slot; the
/// authored carrier list of each algorithm is authoritative.
pub const OPERATOR_COUNT: usize = 4;

/// One weighted modulation route between two operators. Immutable once
/// the owning algorithm is built. Self-feedback is not expressed here;
/// each operator carries its own single-sample feedback path.
#[derive(Clone, Copy, Debug)]
pub struct Connection {
    pub source: usize,
    pub destination: usize,
    pub amount: f32,
}

impl Connection {
    pub fn new(source: usize, destination: usize, amount: f32) -> Self {
        Self {
            source,
            destination,
            amount,
        }
    }
}

/// A fixed directed graph of weighted operator connections plus the
/// authored list of carriers whose outputs form the audible signal.
///
/// Construction validates the graph; evaluation order is the
/// topological order of the connections (ties broken by lowest index)
/// so every modulation input reads an output computed in the same pass.
#[derive(Clone, Debug)]
pub struct Algorithm {
    id: usize,
    name: &'static str,
    connections: Vec<Connection>,
    carriers: Vec<usize>,
    evaluation_order: [usize; OPERATOR_COUNT],
}

impl Algorithm {
    pub fn new(
        id: usize,
        name: &'static str,
        connections: Vec<Connection>,
        carriers: Vec<usize>,
    ) -> Result<Self, String> {
        for connection in &connections {
            if connection.source >= OPERATOR_COUNT || connection.destination >= OPERATOR_COUNT {
                return Err(format!(
                    "Connection {} -> {} out of bounds for {} operators",
                    connection.source, connection.destination, OPERATOR_COUNT
                ));
            }
            if connection.source == connection.destination {
                return Err(format!(
                    "Self-connection on operator {}; use the operator feedback amount instead",
                    connection.source
                ));
            }
        }
        if carriers.is_empty() {
            return Err("Algorithm must declare at least one carrier".to_string());
        }
        if let Some(&bad) = carriers.iter().find(|&&c| c >= OPERATOR_COUNT) {
            return Err(format!(
                "Carrier index {} out of bounds for {} operators",
                bad, OPERATOR_COUNT
            ));
        }

        let evaluation_order = topological_order(&connections)
            .ok_or_else(|| format!("Algorithm '{}' has a modulation cycle", name))?;

        Ok(Self {
            id,
            name,
            connections,
            carriers,
            evaluation_order,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn carriers(&self) -> &[usize] {
        &self.carriers
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Evaluate every operator once, modulators before their
    /// destinations, and return the summed carrier output.
    pub fn process_sample(&self, operators: &mut [Operator; OPERATOR_COUNT]) -> f32 {
        let mut outputs = [0.0_f32; OPERATOR_COUNT];

        for &index in &self.evaluation_order {
            let mut modulation = 0.0;
            for connection in &self.connections {
                if connection.destination == index {
                    modulation += outputs[connection.source] * connection.amount;
                }
            }
            outputs[index] = operators[index].process_sample(modulation);
        }

        self.carriers.iter().map(|&carrier| outputs[carrier]).sum()
    }
}

/// Kahn's algorithm over the connection graph. Lowest index first among
/// ready operators, so the order is deterministic for a given graph.
/// Returns None when the connections contain a cycle.
fn topological_order(connections: &[Connection]) -> Option<[usize; OPERATOR_COUNT]> {
    let mut incoming = [0usize; OPERATOR_COUNT];
    for connection in connections {
        incoming[connection.destination] += 1;
    }

    let mut order = [0usize; OPERATOR_COUNT];
    let mut placed = [false; OPERATOR_COUNT];
    for slot in order.iter_mut() {
        let next = (0..OPERATOR_COUNT).find(|&i| !placed[i] && incoming[i] == 0)?;
        *slot = next;
        placed[next] = true;
        for connection in connections {
            if connection.source == next {
                incoming[connection.destination] -= 1;
            }
        }
    }
    Some(order)
}

/// The built-in algorithm bank, ids 1..=8. Operator roles follow the
/// fixed slot naming: 0 = carrier, 1 = A, 2 = B1, 3 = B2.
pub fn builtin_bank() -> Vec<Algorithm> {
    let entries: Vec<(usize, &'static str, Vec<Connection>, Vec<usize>)> = vec![
        (
            1,
            "Simple FM",
            vec![Connection::new(1, 0, 1.0)],
            vec![0],
        ),
        (
            2,
            "Serial Stack",
            vec![
                Connection::new(3, 2, 1.0),
                Connection::new(2, 1, 1.0),
                Connection::new(1, 0, 1.0),
            ],
            vec![0],
        ),
        (
            3,
            "Dual Modulator",
            vec![Connection::new(2, 0, 1.0), Connection::new(3, 0, 1.0)],
            vec![0],
        ),
        (
            4,
            "Parallel Pairs",
            vec![Connection::new(2, 0, 1.0), Connection::new(3, 1, 1.0)],
            vec![0, 1],
        ),
        (
            5,
            "Fan Out",
            vec![
                Connection::new(3, 0, 1.0),
                Connection::new(3, 1, 1.0),
                Connection::new(3, 2, 1.0),
            ],
            vec![0, 1, 2],
        ),
        (
            6,
            "Branch",
            vec![
                Connection::new(3, 1, 1.0),
                Connection::new(2, 1, 0.5),
                Connection::new(1, 0, 1.0),
            ],
            vec![0],
        ),
        (
            7,
            "Three Carriers",
            vec![Connection::new(3, 2, 1.0)],
            vec![0, 1, 2],
        ),
        (
            8,
            "Organ",
            vec![],
            vec![0, 1, 2, 3],
        ),
    ];

    entries
        .into_iter()
        .map(|(id, name, connections, carriers)| {
            // The bank is authored here; a failure is a programming error
            // caught by the bank validation test, not a runtime condition.
            Algorithm::new(id, name, connections, carriers)
                .unwrap_or_else(|e| panic!("invalid builtin algorithm {}: {}", id, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_bounds_and_self_connections() {
        assert!(Algorithm::new(0, "bad", vec![Connection::new(4, 0, 1.0)], vec![0]).is_err());
        assert!(Algorithm::new(0, "bad", vec![Connection::new(1, 1, 1.0)], vec![0]).is_err());
        assert!(Algorithm::new(0, "bad", vec![], vec![]).is_err());
        assert!(Algorithm::new(0, "bad", vec![], vec![9]).is_err());
    }

    #[test]
    fn rejects_modulation_cycles() {
        let cyclic = vec![
            Connection::new(1, 2, 1.0),
            Connection::new(2, 3, 1.0),
            Connection::new(3, 1, 1.0),
        ];
        assert!(Algorithm::new(0, "cycle", cyclic, vec![0]).is_err());
    }

    #[test]
    fn evaluation_order_puts_modulators_first() {
        let algorithm = Algorithm::new(
            0,
            "stack",
            vec![Connection::new(3, 2, 1.0), Connection::new(2, 0, 1.0)],
            vec![0],
        )
        .unwrap();
        let order = algorithm.evaluation_order;
        let pos = |op: usize| order.iter().position(|&i| i == op).unwrap();
        assert!(pos(3) < pos(2));
        assert!(pos(2) < pos(0));
    }

    #[test]
    fn builtin_bank_is_valid_and_contiguous() {
        let bank = builtin_bank();
        assert_eq!(bank.len(), 8);
        for (index, algorithm) in bank.iter().enumerate() {
            assert_eq!(algorithm.id(), index + 1);
            assert!(!algorithm.carriers().is_empty());
        }
        assert_eq!(bank[0].name(), "Simple FM");
    }
}

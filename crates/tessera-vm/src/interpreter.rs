//! Register machine executing instruction programs.

use std::collections::BTreeSet;
use tessera_common::{Result, Row, RowId, TesseraError};
use tracing::{debug, warn};

use crate::access::TableAccess;
use crate::condition::evaluate_conditions;
use crate::instruction::{Instruction, Program};
use crate::result::ResultEnvelope;

/// Interpreter state: the selector and table registers plus the program
/// counter.
///
/// Programs run front to back with no branches. A failing instruction stops
/// the run; effects of earlier instructions are kept.
#[derive(Debug, Default)]
pub struct Vm {
    selector: BTreeSet<RowId>,
    table: Vec<Row>,
    pc: usize,
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected row-ids.
    pub fn selector(&self) -> &BTreeSet<RowId> {
        &self.selector
    }

    /// Materialized rows.
    pub fn table(&self) -> &[Row] {
        &self.table
    }

    /// Index of the instruction being (or last) executed.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Clears all registers.
    pub fn reset(&mut self) {
        self.selector.clear();
        self.table.clear();
        self.pc = 0;
    }

    /// Runs `program` against `table` from fresh registers and returns the
    /// final table register.
    pub fn run<T>(&mut self, program: &Program, table: &mut T) -> Result<Vec<Row>>
    where
        T: TableAccess + ?Sized,
    {
        self.reset();
        for (pc, instruction) in program.iter().enumerate() {
            self.pc = pc;
            debug!(pc, op = instruction.name(), "executing instruction");
            self.step(instruction, table)?;
        }
        self.pc = program.len();
        Ok(std::mem::take(&mut self.table))
    }

    /// Executes a single instruction.
    pub fn step<T>(&mut self, instruction: &Instruction, table: &mut T) -> Result<()>
    where
        T: TableAccess + ?Sized,
    {
        match instruction {
            Instruction::Insert(row) => {
                table.insert(row.clone())?;
            }
            Instruction::Update(new_values) => {
                table.update(new_values, &self.selected())?;
            }
            Instruction::Delete => {
                table.delete(&self.selected())?;
                self.selector.clear();
            }
            Instruction::Locate(groups) => {
                self.selector = evaluate_conditions(groups, &*table)?;
                debug!(selected = self.selector.len(), "selector updated");
            }
            Instruction::Query => {
                self.table = table.query(&self.selected())?;
            }
            Instruction::Project(columns) => self.project(columns)?,
        }
        Ok(())
    }

    /// Re-tuples every row of the table register by `columns`. Indices may
    /// repeat.
    pub fn project(&mut self, columns: &[usize]) -> Result<()> {
        let projected = self
            .table
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|&column| {
                        row.get(column)
                            .cloned()
                            .ok_or(TesseraError::ColumnNotFound(column))
                    })
                    .collect::<Result<Row>>()
            })
            .collect::<Result<Vec<Row>>>()?;
        self.table = projected;
        Ok(())
    }

    fn selected(&self) -> Vec<RowId> {
        self.selector.iter().copied().collect()
    }
}

/// Runs `program` and wraps the outcome in a result envelope.
pub fn run_program<T>(program: &Program, table: &mut T) -> ResultEnvelope
where
    T: TableAccess + ?Sized,
{
    let mut vm = Vm::new();
    match vm.run(program, table) {
        Ok(content) => ResultEnvelope::success(content),
        Err(e) => {
            warn!(pc = vm.pc(), error = %e, "program aborted");
            ResultEnvelope::failure(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Condition;
    use crate::testing::MockTable;
    use std::collections::BTreeMap;
    use tessera_common::{Comparator, Value};

    fn row(sno: i64, cno: i64, name: &str, grade: i64) -> Row {
        vec![
            Value::Int(sno),
            Value::Int(cno),
            Value::from(name),
            Value::Int(grade),
        ]
    }

    fn sample_content() -> Vec<Row> {
        vec![
            row(0, 3, "Alice", 80),
            row(11, 1, "JackSon Li", 83),
            row(12, 3, "Alpha", 85),
            row(13, 1, "Beta", 88),
            row(14, 3, "Gamma", 90),
            row(15, 2, "Delta", 93),
            row(1, 3, "Epsilon", 96),
            row(2, 2, "Zeta", 97),
            row(3, 3, "Iota", 99),
            row(4, 2, "Kappa", 77),
            row(5, 3, "Omega", 79),
        ]
    }

    fn sample_table() -> MockTable {
        MockTable::new(sample_content())
            .with_result(0, Comparator::Gt, 10, &[1, 2, 3, 4, 5])
            .with_result(2, Comparator::Eq, "JackSon Li", &[1])
            .with_result(1, Comparator::Ne, 3, &[1, 3, 5, 7, 9])
            .with_result(2, Comparator::Ne, "", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
    }

    fn vm_with_table(table: Vec<Row>) -> Vm {
        Vm {
            table,
            ..Vm::default()
        }
    }

    #[test]
    fn test_project_columns() {
        let mut vm = vm_with_table(sample_content());
        vm.project(&[1, 2, 3]).unwrap();
        assert_eq!(vm.table().len(), 11);
        assert_eq!(
            vm.table()[0],
            vec![Value::Int(3), Value::from("Alice"), Value::Int(80)]
        );
        assert_eq!(
            vm.table()[10],
            vec![Value::Int(3), Value::from("Omega"), Value::Int(79)]
        );
    }

    #[test]
    fn test_project_repeated_columns() {
        let mut vm = vm_with_table(sample_content());
        vm.project(&[1, 1, 2, 3]).unwrap();
        assert_eq!(
            vm.table()[1],
            vec![
                Value::Int(1),
                Value::Int(1),
                Value::from("JackSon Li"),
                Value::Int(83)
            ]
        );

        let mut vm = vm_with_table(sample_content());
        vm.project(&[1, 2, 3, 2, 3]).unwrap();
        assert_eq!(
            vm.table()[9],
            vec![
                Value::Int(2),
                Value::from("Kappa"),
                Value::Int(77),
                Value::from("Kappa"),
                Value::Int(77)
            ]
        );
    }

    #[test]
    fn test_project_out_of_range() {
        let mut vm = vm_with_table(sample_content());
        assert!(matches!(
            vm.project(&[0, 4]),
            Err(TesseraError::ColumnNotFound(4))
        ));
        assert_eq!(vm.table().len(), 11);
        assert_eq!(vm.table()[0].len(), 4);
    }

    #[test]
    fn test_locate_query_project() {
        let mut table = sample_table();
        let program = Program::new(vec![
            Instruction::Locate(vec![
                vec![
                    Condition::new(0, Comparator::Gt, 10),
                    Condition::new(2, Comparator::Eq, "JackSon Li"),
                ],
                vec![
                    Condition::new(1, Comparator::Ne, 3),
                    Condition::new(2, Comparator::Ne, ""),
                ],
            ]),
            Instruction::Query,
            Instruction::Project(vec![2]),
        ]);

        let mut vm = Vm::new();
        let rows = vm.run(&program, &mut table).unwrap();
        assert_eq!(vm.selector().iter().copied().collect::<Vec<_>>(), vec![1, 3, 5, 7, 9]);
        let names: Vec<Value> = rows.into_iter().map(|mut r| r.remove(0)).collect();
        assert_eq!(
            names,
            vec![
                Value::from("JackSon Li"),
                Value::from("Beta"),
                Value::from("Delta"),
                Value::from("Zeta"),
                Value::from("Kappa"),
            ]
        );
        assert_eq!(vm.pc(), 3);
    }

    #[test]
    fn test_mutations_use_selector() {
        let mut table = sample_table();
        let mut values = BTreeMap::new();
        values.insert(3, Value::Int(0));
        let program = Program::new(vec![
            Instruction::Insert(row(16, 1, "Nu", 60)),
            Instruction::Locate(vec![vec![Condition::new(0, Comparator::Gt, 10)]]),
            Instruction::Update(values),
            Instruction::Delete,
        ]);

        let envelope = run_program(&program, &mut table);
        assert!(envelope.is_success());
        assert!(envelope.content.is_empty());
        assert_eq!(
            table.calls(),
            vec!["insert", "locate", "locate_all", "update", "delete"]
        );
    }

    #[test]
    fn test_failure_stops_execution() {
        let mut table = sample_table();
        let program = Program::new(vec![
            Instruction::Insert(row(16, 1, "Nu", 60)),
            Instruction::Locate(vec![vec![Condition::new(9, Comparator::Eq, 1)]]),
            Instruction::Delete,
        ]);

        let envelope = run_program(&program, &mut table);
        assert!(!envelope.is_success());
        assert!(envelope.content.is_empty());
        assert_eq!(envelope.error_message.as_deref(), Some("Column not found: 9"));
        // The insert before the failure stays applied.
        assert_eq!(table.calls(), vec!["insert", "locate"]);
        assert_eq!(table.content.len(), 12);
    }

    #[test]
    fn test_run_resets_registers() {
        let mut table = sample_table();
        let mut vm = Vm::new();
        let select_all = Program::new(vec![Instruction::Locate(vec![]), Instruction::Query]);
        assert_eq!(vm.run(&select_all, &mut table).unwrap().len(), 11);
        assert_eq!(vm.selector().len(), 11);

        let empty = Program::default();
        assert!(vm.run(&empty, &mut table).unwrap().is_empty());
        assert!(vm.selector().is_empty());
        assert_eq!(vm.pc(), 0);
    }
}

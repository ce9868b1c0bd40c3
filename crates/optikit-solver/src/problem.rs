use crate::error::SolveError;
use optikit_expr::SymbolicModel;

/// Relation between a constraint expression and zero (the right-hand side is
/// folded into the expression as `lhs - rhs`).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Eq,
    Le,
    Ge,
}

impl ConstraintKind {
    pub fn symbol(self) -> &'static str {
        match self {
            ConstraintKind::Eq => "=",
            ConstraintKind::Le => "<=",
            ConstraintKind::Ge => ">=",
        }
    }
}

/// A single constraint `expr (=|<=|>=) 0` over the problem's variables.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub model: SymbolicModel,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn new(model: SymbolicModel, kind: ConstraintKind) -> Self {
        Self { model, kind }
    }
}

/// An optimization problem: minimize or maximize an objective subject to
/// constraints, all sharing one variable order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub objective: SymbolicModel,
    pub constraints: Vec<Constraint>,
    pub maximize: bool,
}

impl Problem {
    pub fn minimize(objective: SymbolicModel) -> Self {
        Self {
            objective,
            constraints: Vec::new(),
            maximize: false,
        }
    }

    pub fn maximize(objective: SymbolicModel) -> Self {
        Self {
            objective,
            constraints: Vec::new(),
            maximize: true,
        }
    }

    pub fn with_constraint(mut self, model: SymbolicModel, kind: ConstraintKind) -> Self {
        self.constraints.push(Constraint::new(model, kind));
        self
    }

    /// Parses an objective and constraints over an inferred variable list.
    ///
    /// Variables are the sorted union of the free symbols of the objective
    /// and every constraint. Each constraint is given as `(expr, kind)`
    /// where `expr` already has the right-hand side subtracted.
    pub fn parse(
        objective: &str,
        constraints: &[(&str, ConstraintKind)],
        maximize: bool,
    ) -> Result<Self, SolveError> {
        let objective_expr = optikit_expr::parse(objective)?;
        let constraint_exprs = constraints
            .iter()
            .map(|(src, kind)| Ok((optikit_expr::parse(src)?, *kind)))
            .collect::<Result<Vec<_>, SolveError>>()?;

        let mut vars = objective_expr.free_symbols();
        for (expr, _) in &constraint_exprs {
            vars.extend(expr.free_symbols());
        }
        vars.sort();
        vars.dedup();

        let objective = SymbolicModel::from_expr(objective_expr, vars.clone())?;
        let constraints = constraint_exprs
            .into_iter()
            .map(|(expr, kind)| {
                Ok(Constraint::new(
                    SymbolicModel::from_expr(expr, vars.clone())?,
                    kind,
                ))
            })
            .collect::<Result<Vec<_>, SolveError>>()?;

        Ok(Self {
            objective,
            constraints,
            maximize,
        })
    }

    /// Parses against a declared variable list instead of inferring one.
    ///
    /// Every free symbol in the objective and the constraints must appear in
    /// `vars`; unused declared variables are fine and keep their slot.
    pub fn parse_with_vars(
        objective: &str,
        constraints: &[(&str, ConstraintKind)],
        vars: &[String],
        maximize: bool,
    ) -> Result<Self, SolveError> {
        let objective = SymbolicModel::parse(objective, vars)?;
        let constraints = constraints
            .iter()
            .map(|(src, kind)| Ok(Constraint::new(SymbolicModel::parse(src, vars)?, *kind)))
            .collect::<Result<Vec<_>, SolveError>>()?;

        Ok(Self {
            objective,
            constraints,
            maximize,
        })
    }

    pub fn vars(&self) -> &[String] {
        self.objective.vars()
    }

    pub fn dim(&self) -> usize {
        self.objective.dim()
    }

    pub fn equalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::Eq)
    }

    pub fn inequalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.kind != ConstraintKind::Eq)
    }
}

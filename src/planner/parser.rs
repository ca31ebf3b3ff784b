//! Bridge from the external SQL parser to our statement model. The MySQL
//! dialect is used so double-quoted strings tokenize as literals rather
//! than identifiers.

use sqlparser::{
    ast::{
        self as sql, BinaryOperator, CharacterLength, DataType as SqlDataType, Expr as SqlExpr,
        SelectItem, SetExpr, Statement as SqlStatement, TableFactor, UnaryOperator,
    },
    dialect::MySqlDialect,
    parser::Parser,
};

use crate::planner::ast::{
    ColumnDecl, CompareOp, CreateTableStatement, Expr, InsertStatement, OrderBy, Projection,
    SelectStatement, Statement,
};
use crate::planner::error::PlannerError;
use crate::types::value::{DataType, Value};

pub fn parse_statement(sql: &str) -> Result<Statement, PlannerError> {
    let dialect = MySqlDialect {};
    let mut statements = Parser::parse_sql(&dialect, sql)?;
    if statements.len() != 1 {
        return Err(PlannerError::InvalidQuery(
            "expected exactly one statement".to_string(),
        ));
    }
    convert_statement(statements.remove(0))
}

fn convert_statement(statement: SqlStatement) -> Result<Statement, PlannerError> {
    match statement {
        SqlStatement::CreateTable { name, columns, .. } => {
            let columns = columns
                .iter()
                .map(convert_column_def)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Statement::CreateTable(CreateTableStatement {
                name: object_name(&name),
                columns,
            }))
        }
        SqlStatement::Insert {
            table_name,
            columns,
            source,
            ..
        } => {
            let source = source.ok_or_else(|| {
                PlannerError::UnsupportedStatement("INSERT without VALUES".to_string())
            })?;
            let rows = match *source.body {
                SetExpr::Values(values) => values
                    .rows
                    .into_iter()
                    .map(|row| row.into_iter().map(literal_value).collect())
                    .collect::<Result<Vec<_>, _>>()?,
                other => {
                    return Err(PlannerError::UnsupportedStatement(format!(
                        "INSERT source {:?}",
                        other
                    )))
                }
            };
            let columns = if columns.is_empty() {
                None
            } else {
                Some(columns.into_iter().map(|ident| ident.value).collect())
            };
            Ok(Statement::Insert(InsertStatement {
                table: object_name(&table_name),
                columns,
                rows,
            }))
        }
        SqlStatement::Query(query) => convert_query(*query),
        other => Err(PlannerError::UnsupportedStatement(format!("{:?}", other))),
    }
}

fn convert_query(query: sql::Query) -> Result<Statement, PlannerError> {
    let order_by = match query.order_by.len() {
        0 => None,
        1 => {
            let order = &query.order_by[0];
            let column = match &order.expr {
                SqlExpr::Identifier(ident) => ident.value.clone(),
                other => {
                    return Err(PlannerError::UnsupportedExpression(format!(
                        "ORDER BY {:?}",
                        other
                    )))
                }
            };
            Some(OrderBy {
                column,
                descending: !order.asc.unwrap_or(true),
            })
        }
        _ => {
            return Err(PlannerError::UnsupportedStatement(
                "ORDER BY over more than one column".to_string(),
            ))
        }
    };

    let select = match *query.body {
        SetExpr::Select(select) => *select,
        other => {
            return Err(PlannerError::UnsupportedStatement(format!(
                "query body {:?}",
                other
            )))
        }
    };

    if select.from.len() != 1 || !select.from[0].joins.is_empty() {
        return Err(PlannerError::UnsupportedStatement(
            "SELECT must read exactly one table".to_string(),
        ));
    }
    let table = match &select.from[0].relation {
        TableFactor::Table { name, .. } => object_name(name),
        other => {
            return Err(PlannerError::UnsupportedStatement(format!(
                "FROM {:?}",
                other
            )))
        }
    };

    let projection = convert_projection(&select.projection)?;
    let filter = select.selection.map(convert_expr).transpose()?;

    Ok(Statement::Select(SelectStatement {
        projection,
        table,
        filter,
        order_by,
    }))
}

fn convert_projection(items: &[SelectItem]) -> Result<Projection, PlannerError> {
    if items.len() == 1 {
        if let SelectItem::Wildcard(_) = items[0] {
            return Ok(Projection::All);
        }
    }
    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        match item {
            SelectItem::UnnamedExpr(SqlExpr::Identifier(ident)) => {
                columns.push(ident.value.clone())
            }
            other => {
                return Err(PlannerError::UnsupportedExpression(format!(
                    "projection {:?}",
                    other
                )))
            }
        }
    }
    Ok(Projection::Columns(columns))
}

fn convert_expr(expr: SqlExpr) -> Result<Expr, PlannerError> {
    match expr {
        SqlExpr::Nested(inner) => convert_expr(*inner),
        SqlExpr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => Ok(Expr::And(
                Box::new(convert_expr(*left)?),
                Box::new(convert_expr(*right)?),
            )),
            BinaryOperator::Or => Ok(Expr::Or(
                Box::new(convert_expr(*left)?),
                Box::new(convert_expr(*right)?),
            )),
            BinaryOperator::Eq => compare_atom(*left, CompareOp::Eq, *right),
            BinaryOperator::Lt => compare_atom(*left, CompareOp::Lt, *right),
            BinaryOperator::LtEq => compare_atom(*left, CompareOp::LtEq, *right),
            BinaryOperator::Gt => compare_atom(*left, CompareOp::Gt, *right),
            BinaryOperator::GtEq => compare_atom(*left, CompareOp::GtEq, *right),
            other => Err(PlannerError::UnsupportedExpression(format!(
                "operator {:?}",
                other
            ))),
        },
        other => Err(PlannerError::UnsupportedExpression(format!("{:?}", other))),
    }
}

/// Builds a `col OP literal` atom, accepting the operands in either order.
fn compare_atom(left: SqlExpr, op: CompareOp, right: SqlExpr) -> Result<Expr, PlannerError> {
    let (column, op, literal) = match (left, right) {
        (SqlExpr::Identifier(ident), literal) => (ident.value, op, literal),
        (literal, SqlExpr::Identifier(ident)) => (ident.value, op.flipped(), literal),
        (left, right) => {
            return Err(PlannerError::UnsupportedExpression(format!(
                "comparison between {:?} and {:?}",
                left, right
            )))
        }
    };
    let value = literal_value(literal)?;
    if value.is_null() {
        return Err(PlannerError::UnsupportedExpression(
            "comparison with NULL".to_string(),
        ));
    }
    Ok(Expr::Compare { column, op, value })
}

fn literal_value(expr: SqlExpr) -> Result<Value, PlannerError> {
    match expr {
        SqlExpr::Value(sql::Value::Number(text, _)) => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| PlannerError::InvalidQuery(format!("integer literal '{}'", text))),
        SqlExpr::Value(sql::Value::SingleQuotedString(text))
        | SqlExpr::Value(sql::Value::DoubleQuotedString(text)) => Ok(Value::Text(text)),
        SqlExpr::Value(sql::Value::Null) => Ok(Value::Null),
        SqlExpr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal_value(*expr)? {
            Value::Integer(i) => Ok(Value::Integer(-i)),
            other => Err(PlannerError::UnsupportedExpression(format!(
                "negated {:?}",
                other
            ))),
        },
        other => Err(PlannerError::UnsupportedExpression(format!(
            "literal {:?}",
            other
        ))),
    }
}

fn convert_column_def(def: &sql::ColumnDef) -> Result<ColumnDecl, PlannerError> {
    let data_type = match &def.data_type {
        SqlDataType::Int(_) | SqlDataType::Integer(_) => DataType::Integer,
        SqlDataType::Varchar(Some(CharacterLength::IntegerLength { length, .. })) => {
            DataType::Varchar(*length as u32)
        }
        other => return Err(PlannerError::UnsupportedDataType(format!("{:?}", other))),
    };
    Ok(ColumnDecl {
        name: def.name.value.clone(),
        data_type,
    })
}

fn object_name(name: &sql::ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}

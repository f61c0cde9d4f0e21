//! Argument-to-parameter mapping: positional, named, default and vararg.

use super::CallArgument;
use crate::signature::ValueParameter;
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSlot {
    Arguments(SmallVec<[usize; 2]>),
    Default,
    EmptyVararg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    TooManyArguments,
    NamedParameterNotFound(String),
    ArgumentPassedTwice(String),
    MixingNamedAndPositioned,
    NoValueForParameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgumentMapping {
    /// Parameter index per argument.
    pub parameter_of_argument: Vec<Option<usize>>,
    pub slots: Vec<ParameterSlot>,
}

impl ArgumentMapping {
    pub fn defaults_used(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, ParameterSlot::Default))
            .count()
    }

    pub fn varargs_used(&self, parameters: &[ValueParameter]) -> usize {
        self.slots
            .iter()
            .zip(parameters)
            .filter(|(slot, parameter)| parameter.is_vararg && !matches!(slot, ParameterSlot::Default))
            .count()
    }
}

pub fn map_arguments(parameters: &[ValueParameter], arguments: &[CallArgument<'_>]) -> Result<ArgumentMapping, MappingError> {
    let mut assigned: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); parameters.len()];
    let mut filled = vec![false; parameters.len()];
    let mut parameter_of_argument = vec![None; arguments.len()];
    let mut next_positional = 0usize;
    let mut seen_named = false;

    for (index, argument) in arguments.iter().enumerate() {
        match &argument.name {
            Some(name) => {
                seen_named = true;
                let Some(position) = parameters.iter().position(|parameter| &parameter.name == name) else {
                    return Err(MappingError::NamedParameterNotFound(name.clone()));
                };
                if filled[position] {
                    return Err(MappingError::ArgumentPassedTwice(name.clone()));
                }
                filled[position] = true;
                assigned[position].push(index);
                parameter_of_argument[index] = Some(position);
            }
            None => {
                if seen_named {
                    return Err(MappingError::MixingNamedAndPositioned);
                }
                let Some(parameter) = parameters.get(next_positional) else {
                    return Err(MappingError::TooManyArguments);
                };
                assigned[next_positional].push(index);
                filled[next_positional] = true;
                parameter_of_argument[index] = Some(next_positional);
                if !parameter.is_vararg {
                    next_positional += 1;
                }
            }
        }
    }

    let mut slots = Vec::with_capacity(parameters.len());
    for (parameter, arguments) in parameters.iter().zip(assigned) {
        let slot = if !arguments.is_empty() {
            ParameterSlot::Arguments(arguments)
        } else if parameter.has_default {
            ParameterSlot::Default
        } else if parameter.is_vararg {
            ParameterSlot::EmptyVararg
        } else {
            return Err(MappingError::NoValueForParameter(parameter.name.clone()));
        };
        slots.push(slot);
    }

    Ok(ArgumentMapping {
        parameter_of_argument,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use tern_ast::Span;

    fn params() -> Vec<ValueParameter> {
        vec![
            ValueParameter::new("a", Type::int()),
            ValueParameter::new("b", Type::string()).with_default(),
            ValueParameter::new("rest", Type::int()).vararg(),
        ]
    }

    fn arg(name: Option<&str>) -> CallArgument<'static> {
        let argument = CallArgument::typed(Type::int(), Span::dummy());
        match name {
            Some(name) => argument.named(name),
            None => argument,
        }
    }

    #[test]
    fn positional_arguments_fill_vararg_tail() {
        let mapping = map_arguments(&params(), &[arg(None), arg(None), arg(None), arg(None)]).expect("mapped");
        assert_eq!(mapping.parameter_of_argument, vec![Some(0), Some(1), Some(2), Some(2)]);
        assert_eq!(mapping.defaults_used(), 0);
        assert_eq!(mapping.varargs_used(&params()), 1);
    }

    #[test]
    fn defaults_and_empty_varargs() {
        let mapping = map_arguments(&params(), &[arg(None)]).expect("mapped");
        assert_eq!(mapping.slots[1], ParameterSlot::Default);
        assert_eq!(mapping.slots[2], ParameterSlot::EmptyVararg);
    }

    #[test]
    fn named_argument_errors() {
        assert_eq!(
            map_arguments(&params(), &[arg(Some("zzz"))]),
            Err(MappingError::NamedParameterNotFound("zzz".into()))
        );
        assert_eq!(
            map_arguments(&params(), &[arg(None), arg(Some("a"))]),
            Err(MappingError::ArgumentPassedTwice("a".into()))
        );
        assert_eq!(
            map_arguments(&params(), &[arg(Some("a")), arg(None)]),
            Err(MappingError::MixingNamedAndPositioned)
        );
        assert_eq!(
            map_arguments(&params(), &[arg(Some("b"))]),
            Err(MappingError::NoValueForParameter("a".into()))
        );
    }

    #[test]
    fn too_many_arguments_without_vararg() {
        let parameters = vec![ValueParameter::new("only", Type::int())];
        assert_eq!(
            map_arguments(&parameters, &[arg(None), arg(None)]),
            Err(MappingError::TooManyArguments)
        );
    }
}

//! Field declarations and the typed accessors built for them

use super::collection::{ContainerKind, EntityCollection};
use super::Entity;
use crate::errors::ConversionError;
use entorm_core_types::{Value, ValueType};
use std::any::{Any, TypeId};
use std::sync::Arc;

pub(crate) type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<(), ConversionError> + Send + Sync>;

/// Erased members of a many-to-many collection
pub type Elements = Vec<Box<dyn Any + Send>>;

pub(crate) type Take<T> = Arc<dyn Fn(&mut T) -> Option<Elements> + Send + Sync>;
pub(crate) type Assign<T> = Arc<dyn Fn(&mut T, Elements) -> Result<(), ConversionError> + Send + Sync>;

/// Rust types that map onto a single scalar column
pub trait FieldValue: Sized + Send + Sync + 'static {
    const VALUE_TYPE: ValueType;

    fn to_value(&self) -> Value;

    /// NULL becomes the type's zero value unless the field is an `Option`
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

impl FieldValue for String {
    const VALUE_TYPE: ValueType = ValueType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(ConversionError::new("text", &other)),
        }
    }
}

impl FieldValue for i64 {
    const VALUE_TYPE: ValueType = ValueType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(v) => Ok(v),
            Value::Boolean(b) => Ok(i64::from(b)),
            Value::Null => Ok(0),
            other => Err(ConversionError::new("integer", &other)),
        }
    }
}

impl FieldValue for i32 {
    const VALUE_TYPE: ValueType = ValueType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| ConversionError::new("32-bit integer", &Value::Integer(wide)))
    }
}

impl FieldValue for f64 {
    const VALUE_TYPE: ValueType = ValueType::Real;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            Value::Null => Ok(0.0),
            other => Err(ConversionError::new("real", &other)),
        }
    }
}

impl FieldValue for f32 {
    const VALUE_TYPE: ValueType = ValueType::Real;

    fn to_value(&self) -> Value {
        Value::Real(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FieldValue for bool {
    const VALUE_TYPE: ValueType = ValueType::Boolean;

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Integer(v) => Ok(v != 0),
            Value::Null => Ok(false),
            other => Err(ConversionError::new("boolean", &other)),
        }
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const VALUE_TYPE: ValueType = V::VALUE_TYPE;

    fn to_value(&self) -> Value {
        self.as_ref().map(V::to_value).unwrap_or(Value::Null)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => V::from_value(other).map(Some),
        }
    }
}

/// Key generation strategy of an id column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationType {
    Auto,
    Identity,
}

/// Per-column naming and constraint options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOptions {
    pub name: Option<String>,
    pub insertable: bool,
    pub updatable: bool,
    pub nullable: bool,
    pub unique: bool,
    pub length: u32,
    /// Raw type text replacing the dialect's storage type in CREATE
    pub definition: Option<String>,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            name: None,
            insertable: true,
            updatable: true,
            nullable: true,
            unique: false,
            length: 255,
            definition: None,
        }
    }
}

impl ColumnOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self::default().name(name)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn insertable(mut self, insertable: bool) -> Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }
}

/// One side of an explicit join table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinColumn {
    pub name: Option<String>,
    pub referenced_column: Option<String>,
}

impl JoinColumn {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            referenced_column: None,
        }
    }

    pub fn references(mut self, column: impl Into<String>) -> Self {
        self.referenced_column = Some(column.into());
        self
    }
}

/// Explicit naming of the join table behind a many-to-many field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinTable {
    pub name: Option<String>,
    /// Owner side
    pub join_column: JoinColumn,
    /// Embedded side
    pub inverse_join_column: JoinColumn,
}

impl JoinTable {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn join_column(mut self, column: JoinColumn) -> Self {
        self.join_column = column;
        self
    }

    pub fn inverse_join_column(mut self, column: JoinColumn) -> Self {
        self.inverse_join_column = column;
        self
    }
}

pub(crate) struct AssociationDef<T> {
    pub(crate) target: TypeId,
    pub(crate) target_name: &'static str,
    pub(crate) container: ContainerKind,
    pub(crate) fetch_eager: bool,
    pub(crate) join_table: Option<JoinTable>,
    pub(crate) take: Take<T>,
    pub(crate) assign: Assign<T>,
}

pub(crate) enum FieldKind<T> {
    Scalar {
        value_type: ValueType,
        get: Getter<T>,
        set: Option<Setter<T>>,
    },
    ManyToMany(AssociationDef<T>),
}

/// A declared field of a mapped type
pub struct Field<T> {
    pub(crate) name: String,
    pub(crate) kind: FieldKind<T>,
    pub(crate) transient: bool,
    pub(crate) id: bool,
    pub(crate) generation: Option<GenerationType>,
    pub(crate) options: ColumnOptions,
}

impl<T: 'static> Field<T> {
    /// A mutable scalar field
    pub fn new<V: FieldValue>(
        name: impl Into<String>,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        let set: Setter<T> = Arc::new(move |target: &mut T, value: Value| {
            *get_mut(target) = V::from_value(value)?;
            Ok(())
        });
        Self::scalar(name.into(), V::VALUE_TYPE, Arc::new(move |t: &T| get(t).to_value()), Some(set))
    }

    /// The identity field; generation defaults to `Auto`
    pub fn id(
        name: impl Into<String>,
        get: fn(&T) -> &Option<i64>,
        get_mut: fn(&mut T) -> &mut Option<i64>,
    ) -> Self {
        let mut field = Self::new(name, get, get_mut);
        field.id = true;
        field.generation = Some(GenerationType::Auto);
        field
    }

    /// A field without a setter; must also be marked transient
    pub fn read_only<V: FieldValue>(name: impl Into<String>, get: fn(&T) -> &V) -> Self {
        Self::scalar(name.into(), V::VALUE_TYPE, Arc::new(move |t: &T| get(t).to_value()), None)
    }

    /// The owner side of a many-to-many association with `E`
    pub fn many_to_many<E, C>(name: impl Into<String>, get_mut: fn(&mut T) -> &mut Option<C>) -> Self
    where
        E: Entity,
        C: EntityCollection<E>,
    {
        let take: Take<T> = Arc::new(move |owner: &mut T| {
            get_mut(owner).take().map(|collection| {
                collection
                    .into_elements()
                    .into_iter()
                    .map(|e| Box::new(e) as Box<dyn Any + Send>)
                    .collect()
            })
        });
        let assign: Assign<T> = Arc::new(move |owner: &mut T, elements: Elements| {
            let mut typed = Vec::with_capacity(elements.len());
            for element in elements {
                match element.downcast::<E>() {
                    Ok(e) => typed.push(*e),
                    Err(_) => {
                        return Err(ConversionError {
                            expected: std::any::type_name::<E>(),
                            found: "element of another type".to_string(),
                        })
                    }
                }
            }
            *get_mut(owner) = Some(C::from_elements(typed));
            Ok(())
        });
        Self {
            name: name.into(),
            kind: FieldKind::ManyToMany(AssociationDef {
                target: TypeId::of::<E>(),
                target_name: std::any::type_name::<E>(),
                container: C::KIND,
                fetch_eager: false,
                join_table: None,
                take,
                assign,
            }),
            transient: false,
            id: false,
            generation: None,
            options: ColumnOptions::default(),
        }
    }

    fn scalar(name: String, value_type: ValueType, get: Getter<T>, set: Option<Setter<T>>) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar {
                value_type,
                get,
                set,
            },
            transient: false,
            id: false,
            generation: None,
            options: ColumnOptions::default(),
        }
    }

    pub fn column(mut self, options: ColumnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn generated(mut self, generation: GenerationType) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Load the collection together with its owner
    pub fn fetch_eager(mut self) -> Self {
        if let FieldKind::ManyToMany(def) = &mut self.kind {
            def.fetch_eager = true;
        }
        self
    }

    pub fn join_table(mut self, join_table: JoinTable) -> Self {
        if let FieldKind::ManyToMany(def) = &mut self.kind {
            def.join_table = Some(join_table);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-target a base type's field onto a type embedding that base
    pub(crate) fn lift<O: 'static>(self, base: fn(&O) -> &T, base_mut: fn(&mut O) -> &mut T) -> Field<O> {
        let kind = match self.kind {
            FieldKind::Scalar {
                value_type,
                get,
                set,
            } => FieldKind::Scalar {
                value_type,
                get: Arc::new(move |o: &O| get(base(o))),
                set: set.map(|set| -> Setter<O> {
                    Arc::new(move |o: &mut O, value: Value| set(base_mut(o), value))
                }),
            },
            FieldKind::ManyToMany(def) => {
                let take = def.take;
                let assign = def.assign;
                FieldKind::ManyToMany(AssociationDef {
                    target: def.target,
                    target_name: def.target_name,
                    container: def.container,
                    fetch_eager: def.fetch_eager,
                    join_table: def.join_table,
                    take: Arc::new(move |o: &mut O| take(base_mut(o))),
                    assign: Arc::new(move |o: &mut O, elements: Elements| assign(base_mut(o), elements)),
                })
            }
        };
        Field {
            name: self.name,
            kind,
            transient: self.transient,
            id: self.id,
            generation: self.generation,
            options: self.options,
        }
    }
}

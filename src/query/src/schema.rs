//! Directory schema: which attribute means what for each entity kind
//!
//! Projection, the interpreter and the SQL compiler all consult this table,
//! so per-kind attribute knowledge lives here only.

use crate::attribute::Attribute;
use dirgate_core::{Entity, EntityKind};

/// Stored field an attribute maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Name,
    Description,
    Username,
    LastName,
    FirstName,
    DisplayName,
    Email,
}

impl Field {
    /// Value of this field on `entity`, if the kind has it and it is set
    pub fn value_of<'a>(&self, entity: &'a Entity) -> Option<&'a str> {
        match (entity, self) {
            (Entity::Domain(d), Field::Id) => Some(d.id.as_str()),
            (Entity::OrganizationalUnit(u), Field::Id) => Some(u.id.as_str()),
            (Entity::Group(g), Field::Id) => Some(g.id.as_str()),
            (Entity::Group(g), Field::Name) => Some(&g.name),
            (Entity::Group(g), Field::Description) => g.description.as_deref(),
            (Entity::User(u), Field::Id) => Some(u.id.as_str()),
            (Entity::User(u), Field::Username) => Some(&u.username),
            (Entity::User(u), Field::LastName) => u.last_name.as_deref(),
            (Entity::User(u), Field::FirstName) => u.first_name.as_deref(),
            (Entity::User(u), Field::DisplayName) => u.display_name.as_deref(),
            (Entity::User(u), Field::Email) => u.email.as_deref(),
            _ => None,
        }
    }

    /// Column holding this field in the relational cache
    pub fn column(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Description => "description",
            Field::Username => "username",
            Field::LastName => "last_name",
            Field::FirstName => "first_name",
            Field::DisplayName => "display_name",
            Field::Email => "email",
        }
    }
}

/// Membership attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// `member` / `uniqueMember`: the entity's members
    Member,
    /// `memberOf`: groups containing the entity
    MemberOf,
}

/// What an attribute means for a given kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    Field(Field),
    ObjectClass,
    Membership(Relation),
    NotApplicable,
}

/// Resolve the role of a canonical attribute for `kind`
pub fn role_of(kind: EntityKind, canonical: &str) -> AttributeRole {
    let Some(attribute) = Attribute::from_oid(canonical) else {
        return AttributeRole::NotApplicable;
    };

    use Attribute as A;
    use AttributeRole::{Field as F, Membership as M};
    match (kind, attribute) {
        (_, A::ObjectClass) => AttributeRole::ObjectClass,

        (EntityKind::Domain, A::DomainComponent) => F(Field::Id),

        (EntityKind::OrganizationalUnit, A::OrganizationalUnit) => F(Field::Id),

        (EntityKind::Group, A::CommonName) => F(Field::Name),
        (EntityKind::Group, A::Description) => F(Field::Description),
        (EntityKind::Group, A::Member) => M(Relation::Member),
        (EntityKind::Group, A::MemberOf) => M(Relation::MemberOf),

        (EntityKind::User, A::Uid) => F(Field::Username),
        (EntityKind::User, A::CommonName) => F(Field::Username),
        (EntityKind::User, A::Surname) => F(Field::LastName),
        (EntityKind::User, A::GivenName) => F(Field::FirstName),
        (EntityKind::User, A::DisplayName) => F(Field::DisplayName),
        (EntityKind::User, A::Mail) => F(Field::Email),
        (EntityKind::User, A::MemberOf) => M(Relation::MemberOf),

        _ => AttributeRole::NotApplicable,
    }
}

/// Fixed object classes of each kind
pub fn object_classes(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Domain => &["top", "domain", "dcObject"],
        EntityKind::OrganizationalUnit => &["top", "organizationalUnit"],
        EntityKind::Group => &["top", "groupOfNames", "groupOfUniqueNames"],
        EntityKind::User => &["top", "person", "organizationalPerson", "inetOrgPerson"],
    }
}

/// Table holding entities of `kind` in the relational cache
pub fn table_of(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Group => Some("groups"),
        EntityKind::User => Some("users"),
        EntityKind::Domain | EntityKind::OrganizationalUnit => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::normalize_attribute;
    use dirgate_core::{Group, User};

    #[test]
    fn test_common_name_differs_per_kind() {
        let cn = normalize_attribute("cn");
        assert_eq!(role_of(EntityKind::Group, &cn), AttributeRole::Field(Field::Name));
        assert_eq!(role_of(EntityKind::User, &cn), AttributeRole::Field(Field::Username));
        assert_eq!(role_of(EntityKind::Domain, &cn), AttributeRole::NotApplicable);
    }

    #[test]
    fn test_membership_roles() {
        let member = normalize_attribute("uniqueMember");
        let member_of = normalize_attribute("memberOf");
        assert_eq!(role_of(EntityKind::Group, &member), AttributeRole::Membership(Relation::Member));
        assert_eq!(role_of(EntityKind::User, &member), AttributeRole::NotApplicable);
        assert_eq!(role_of(EntityKind::User, &member_of), AttributeRole::Membership(Relation::MemberOf));
        assert_eq!(role_of(EntityKind::OrganizationalUnit, &member_of), AttributeRole::NotApplicable);
    }

    #[test]
    fn test_unknown_attribute_not_applicable() {
        assert_eq!(role_of(EntityKind::User, "telephoneNumber"), AttributeRole::NotApplicable);
        assert_eq!(role_of(EntityKind::User, "2.5.4.0"), AttributeRole::ObjectClass);
    }

    #[test]
    fn test_field_values() {
        let group = Entity::from(Group::new("Admins"));
        assert_eq!(Field::Name.value_of(&group), Some("Admins"));
        assert_eq!(Field::Description.value_of(&group), None);
        assert_eq!(Field::Email.value_of(&group), None);

        let user = Entity::from(User::new("alice").with_email("alice@example.com"));
        assert_eq!(Field::Email.value_of(&user), Some("alice@example.com"));
        assert_eq!(Field::Id.value_of(&user), Some("alice"));
    }
}

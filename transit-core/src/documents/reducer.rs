//! Line-item input reduction
//!
//! Turns caller-facing input trees into stored line sets: validates
//! quantities and prices, assigns line ids and computes each leaf's
//! montant_ht. Tax stays at the document level.

use crate::documents::money::{ligne_montant, validate_prix_unitaire, validate_quantite};
use crate::error::{DomainError, DomainResult};
use shared::document::{
    ConteneurGroup, ConteneurInput, LigneOperation, LigneSet, LigneSetInput, LotInput, LotItem,
    OperationInput,
};

fn operation_to_ligne(input: &OperationInput) -> DomainResult<LigneOperation> {
    if input.type_operation.trim().is_empty() {
        return Err(DomainError::validation("type_operation", "must not be empty"));
    }
    validate_quantite(input.quantite)?;
    validate_prix_unitaire(input.prix_unitaire)?;
    if let (Some(debut), Some(fin)) = (input.date_debut, input.date_fin)
        && fin < debut
    {
        return Err(DomainError::validation(
            "date_fin",
            "must not precede date_debut",
        ));
    }
    Ok(LigneOperation {
        ligne_id: uuid::Uuid::new_v4().to_string(),
        type_operation: input.type_operation.trim().to_string(),
        date_debut: input.date_debut,
        date_fin: input.date_fin,
        lieu: input.lieu.clone(),
        quantite: input.quantite,
        prix_unitaire: input.prix_unitaire,
        montant_ht: ligne_montant(input.quantite, input.prix_unitaire),
    })
}

fn conteneur_to_group(input: &ConteneurInput) -> DomainResult<ConteneurGroup> {
    if input.numero_conteneur.trim().is_empty() {
        return Err(DomainError::validation(
            "numero_conteneur",
            "must not be empty",
        ));
    }
    if input.operations.is_empty() {
        return Err(DomainError::validation(
            "operations",
            format!(
                "container {} must carry at least one operation",
                input.numero_conteneur
            ),
        ));
    }
    let operations = input
        .operations
        .iter()
        .map(operation_to_ligne)
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(ConteneurGroup {
        conteneur_id: uuid::Uuid::new_v4().to_string(),
        numero_conteneur: input.numero_conteneur.trim().to_string(),
        type_conteneur: input.type_conteneur.clone(),
        taille: input.taille.clone(),
        armateur_id: input.armateur_id.clone(),
        operations,
    })
}

fn lot_to_item(input: &LotInput) -> DomainResult<LotItem> {
    if input.designation.trim().is_empty() {
        return Err(DomainError::validation("designation", "must not be empty"));
    }
    validate_quantite(input.quantite)?;
    validate_prix_unitaire(input.prix_unitaire)?;
    for (field, value) in [("poids", input.poids), ("volume", input.volume)] {
        if let Some(v) = value
            && !(v.is_finite() && v >= 0.0)
        {
            return Err(DomainError::validation(
                field,
                format!("must be a non-negative number, got {v}"),
            ));
        }
    }
    Ok(LotItem {
        lot_id: uuid::Uuid::new_v4().to_string(),
        designation: input.designation.trim().to_string(),
        quantite: input.quantite,
        poids: input.poids,
        volume: input.volume,
        prix_unitaire: input.prix_unitaire,
        montant_ht: ligne_montant(input.quantite, input.prix_unitaire),
    })
}

/// Validate an input tree and reduce it to a stored line set
pub fn input_to_lignes(input: &LigneSetInput) -> DomainResult<LigneSet> {
    let lignes = match input {
        LigneSetInput::Independant(operations) => LigneSet::Independant(
            operations
                .iter()
                .map(operation_to_ligne)
                .collect::<DomainResult<Vec<_>>>()?,
        ),
        LigneSetInput::Conteneur(conteneurs) => LigneSet::Conteneur(
            conteneurs
                .iter()
                .map(conteneur_to_group)
                .collect::<DomainResult<Vec<_>>>()?,
        ),
        LigneSetInput::Lot(lots) => LigneSet::Lot(
            lots.iter()
                .map(lot_to_item)
                .collect::<DomainResult<Vec<_>>>()?,
        ),
    };
    if lignes.is_empty() {
        return Err(DomainError::validation(
            "lignes",
            "document must carry at least one line item",
        ));
    }
    Ok(lignes)
}

/// Deep-copy a line set with fresh ids (conversion keeps quantities,
/// prices and descriptions but the copies are new rows)
pub fn clone_lignes_with_new_ids(lignes: &LigneSet) -> LigneSet {
    match lignes {
        LigneSet::Independant(operations) => LigneSet::Independant(
            operations
                .iter()
                .map(|op| LigneOperation {
                    ligne_id: uuid::Uuid::new_v4().to_string(),
                    ..op.clone()
                })
                .collect(),
        ),
        LigneSet::Conteneur(groups) => LigneSet::Conteneur(
            groups
                .iter()
                .map(|g| ConteneurGroup {
                    conteneur_id: uuid::Uuid::new_v4().to_string(),
                    operations: g
                        .operations
                        .iter()
                        .map(|op| LigneOperation {
                            ligne_id: uuid::Uuid::new_v4().to_string(),
                            ..op.clone()
                        })
                        .collect(),
                    ..g.clone()
                })
                .collect(),
        ),
        LigneSet::Lot(lots) => LigneSet::Lot(
            lots.iter()
                .map(|lot| LotItem {
                    lot_id: uuid::Uuid::new_v4().to_string(),
                    ..lot.clone()
                })
                .collect(),
        ),
    }
}
